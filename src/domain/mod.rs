pub mod attendance_window;
pub mod evaluation_grade;
pub mod leave_rules;
pub mod quiz;
pub mod settings;
pub mod tictactoe;
