pub mod llm;
pub mod openmeteo;
