mod builder;
mod digest;
mod response;
mod template;

pub use builder::{
    BuiltPrompt, PromptBuilder, INTENT_TEMPLATE_ID, NARRATION_TEMPLATE_ID, PLAN_TEMPLATE_ID,
    SQL_REPAIR_TEMPLATE_ID, SQL_TEMPLATE_ID, SYNTHESIS_TEMPLATE_ID,
};
pub use digest::{render_digest, SchemaDigest};
pub use response::strip_code_fences;
pub use template::PromptTemplate;
