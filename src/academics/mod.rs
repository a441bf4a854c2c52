//! Academic calendar construction and the block → course → annual grade
//! aggregation pipeline.

pub mod annual_average;
pub mod block_average;
pub mod block_days;
pub mod calendar;
pub mod capture;
pub mod course_average;
mod math;

pub use annual_average::{
    annual_averages_by_student, annual_averages_by_tutor, annual_averages_for_students,
    calculate_annual_average,
};
pub use block_average::{calculate_block_average, student_block_averages};
pub use block_days::{map_schedule_block_days, map_teacher_block_days, schedule_block_days};
pub use calendar::{create_teaching_block, register_calendar, school_calendar, teaching_blocks};
pub use capture::{QualificationEntry, record_evaluation, record_qualifications};
pub use course_average::{calculate_course_average, student_course_averages};
