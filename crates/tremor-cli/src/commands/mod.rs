pub mod check;
pub mod database;
pub mod pairs;
pub mod run;
