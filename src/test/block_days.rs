#[cfg(test)]
mod tests {
    use crate::academics::{
        create_teaching_block, map_schedule_block_days, map_teacher_block_days,
        register_calendar, schedule_block_days,
    };
    use crate::error::AppError;
    use crate::test::utils::{TestDbBuilder, create_standard_test_db, date, raw_dates};

    #[rocket::async_test]
    async fn test_mondays_map_onto_their_block() {
        let test_db = create_standard_test_db().await;
        let year_id = test_db.year_id("2025");
        let schedule_id = test_db.schedule_id("math-monday");

        register_calendar(
            &test_db.pool,
            year_id,
            &raw_dates(&["2025-03-03", "2025-03-05", "2025-03-10", "2025-03-17"]),
        )
        .await
        .unwrap();
        let block = create_teaching_block(
            &test_db.pool,
            year_id,
            "Bloque 1",
            date("2025-03-01"),
            date("2025-03-31"),
        )
        .await
        .unwrap();

        let mapped = map_schedule_block_days(&test_db.pool, schedule_id)
            .await
            .expect("mapping succeeds");

        assert_eq!(mapped.len(), 3);
        assert!(mapped.iter().all(|row| row.teaching_block_id == block.id));
        assert!(mapped.iter().all(|row| row.schedule_id == schedule_id));
        assert!(mapped.iter().all(|row| row.year_id == year_id));

        let stored = schedule_block_days(&test_db.pool, schedule_id).await.unwrap();
        assert_eq!(stored, mapped);
    }

    #[rocket::async_test]
    async fn test_second_mapping_conflicts() {
        let test_db = create_standard_test_db().await;
        test_db.seed_march("2025").await;
        let schedule_id = test_db.schedule_id("math-monday");

        let first = map_schedule_block_days(&test_db.pool, schedule_id)
            .await
            .unwrap();
        assert_eq!(first.len(), 5);

        let second = map_schedule_block_days(&test_db.pool, schedule_id).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(test_db.count("schedule_block_days").await, 5);
    }

    #[rocket::async_test]
    async fn test_days_outside_every_block_are_skipped() {
        let test_db = create_standard_test_db().await;
        let year_id = test_db.year_id("2025");

        register_calendar(
            &test_db.pool,
            year_id,
            &raw_dates(&["2025-03-03", "2025-03-10", "2025-03-17", "2025-04-07"]),
        )
        .await
        .unwrap();
        let first = create_teaching_block(
            &test_db.pool,
            year_id,
            "Bloque 1",
            date("2025-03-01"),
            date("2025-03-12"),
        )
        .await
        .unwrap();
        let second = create_teaching_block(
            &test_db.pool,
            year_id,
            "Bloque 2",
            date("2025-04-01"),
            date("2025-04-30"),
        )
        .await
        .unwrap();

        let mapped = map_schedule_block_days(&test_db.pool, test_db.schedule_id("math-monday"))
            .await
            .unwrap();

        let blocks: Vec<i64> = mapped.iter().map(|row| row.teaching_block_id).collect();
        assert_eq!(blocks, vec![first.id, first.id, second.id]);
    }

    #[rocket::async_test]
    async fn test_missing_calendar_or_blocks_is_not_found() {
        let test_db = create_standard_test_db().await;
        let year_id = test_db.year_id("2025");
        let schedule_id = test_db.schedule_id("math-monday");

        let result = map_schedule_block_days(&test_db.pool, schedule_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        register_calendar(&test_db.pool, year_id, &raw_dates(&["2025-03-03"]))
            .await
            .unwrap();

        let result = map_schedule_block_days(&test_db.pool, schedule_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(test_db.count("schedule_block_days").await, 0);
    }

    #[rocket::async_test]
    async fn test_inactive_school_days_do_not_count_as_a_calendar() {
        let test_db = create_standard_test_db().await;
        test_db.seed_march("2025").await;
        sqlx::query("UPDATE school_days SET active = 0 WHERE year_id = ?")
            .bind(test_db.year_id("2025"))
            .execute(&test_db.pool)
            .await
            .unwrap();

        let result =
            map_schedule_block_days(&test_db.pool, test_db.schedule_id("math-monday")).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(test_db.count("schedule_block_days").await, 0);
    }

    #[rocket::async_test]
    async fn test_inactive_schedule_is_rejected() {
        let test_db = create_standard_test_db().await;
        test_db.seed_march("2025").await;
        let schedule_id = test_db.schedule_id("math-monday");
        sqlx::query("UPDATE schedules SET active = 0 WHERE id = ?")
            .bind(schedule_id)
            .execute(&test_db.pool)
            .await
            .unwrap();

        let result = map_schedule_block_days(&test_db.pool, schedule_id).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // The teacher-wide mapping skips it as well.
        let mapped = map_teacher_block_days(
            &test_db.pool,
            test_db.person_id("garcia"),
            test_db.year_id("2025"),
        )
        .await
        .unwrap();
        assert!(mapped.iter().all(|row| row.schedule_id != schedule_id));
        assert_eq!(mapped.len(), 4);
    }

    #[rocket::async_test]
    async fn test_schedule_without_weekday_is_rejected() {
        let test_db = TestDbBuilder::new()
            .year("2025")
            .person("garcia", "Lucía", "García")
            .course("Historia")
            .classroom("1A", "Primero", "A")
            .assignment("history", "garcia", "Historia", "1A", "2025")
            .schedule("history-unset", "history", None)
            .build()
            .await
            .unwrap();
        test_db.seed_march("2025").await;

        let result =
            map_schedule_block_days(&test_db.pool, test_db.schedule_id("history-unset")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[rocket::async_test]
    async fn test_unknown_schedule_is_not_found() {
        let test_db = create_standard_test_db().await;

        let result = map_schedule_block_days(&test_db.pool, 999).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = schedule_block_days(&test_db.pool, 999).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn test_teacher_mapping_covers_every_schedule() {
        let test_db = create_standard_test_db().await;
        test_db.seed_march("2025").await;

        let mapped = map_teacher_block_days(
            &test_db.pool,
            test_db.person_id("garcia"),
            test_db.year_id("2025"),
        )
        .await
        .unwrap();

        // Five Mondays and four Wednesdays in March 2025.
        assert_eq!(mapped.len(), 9);
        let mondays = mapped
            .iter()
            .filter(|row| row.schedule_id == test_db.schedule_id("math-monday"))
            .count();
        assert_eq!(mondays, 5);
    }

    #[rocket::async_test]
    async fn test_teacher_mapping_is_all_or_nothing() {
        let test_db = create_standard_test_db().await;
        test_db.seed_march("2025").await;

        map_schedule_block_days(&test_db.pool, test_db.schedule_id("math-wednesday"))
            .await
            .unwrap();

        let result = map_teacher_block_days(
            &test_db.pool,
            test_db.person_id("garcia"),
            test_db.year_id("2025"),
        )
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        // Only the Wednesday rows from the first call exist.
        assert_eq!(test_db.count("schedule_block_days").await, 4);
    }

    #[rocket::async_test]
    async fn test_teacher_without_schedules_is_not_found() {
        let test_db = create_standard_test_db().await;
        test_db.seed_march("2025").await;

        let result = map_teacher_block_days(
            &test_db.pool,
            test_db.person_id("ana"),
            test_db.year_id("2025"),
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
