pub mod assessments;
pub mod assignments;
pub mod classes;
pub mod core;
pub mod future_classes;
pub mod grades;
pub mod sync;
