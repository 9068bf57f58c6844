pub mod db;
pub mod file_store;
pub mod model_llm;

pub use db::DbAdapter;
pub use file_store::JsonFileStore;
pub use model_llm::OpenAiModelAdapter;
