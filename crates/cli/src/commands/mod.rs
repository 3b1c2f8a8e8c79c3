pub mod doctor;
pub mod run;
pub mod scenarios;
pub mod serve;
