pub mod chat_completion_openai_repository;
