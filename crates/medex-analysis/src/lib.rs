mod openai;

pub use openai::OpenAiTransform;
