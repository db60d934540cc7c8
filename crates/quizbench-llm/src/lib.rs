pub mod openai;

pub mod prelude {
    pub use crate::openai::OpenAiChatModel;
}
