pub mod money;
pub mod text;

pub use money::{round2, to_cents};
pub use text::clean_llm_json;
