pub mod grid;
pub mod scenario;
pub mod seir;
pub mod transmission;
