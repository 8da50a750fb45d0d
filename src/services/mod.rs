pub mod completion_service;
pub mod flashcard_generation_service;
pub mod generation_service;
pub mod stats_service;
