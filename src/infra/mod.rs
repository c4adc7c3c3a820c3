//! Infrastructure as code
//!
//! Two stacks, rendered as plain CloudFormation:
//! - [`UserPoolStack`]: the user pool, its hosted UI domain, an app client and a demo user
//! - [`HttpApiStack`]: an HTTP API whose `/private` route sits behind a JWT authorizer
//!   bound to that pool

pub mod http_api;
pub mod template;
pub mod user_pool;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

pub use http_api::HttpApiStack;
pub use template::{Template, TemplateFormat};
pub use user_pool::UserPoolStack;

use crate::Result;

/// A deployable stack
pub trait Stack {
    /// Stack name, also used for the template file name
    fn name(&self) -> &str;

    /// Build the template
    fn template(&self) -> Result<Template>;
}

/// Write `<name>.template.<ext>` into `out_dir` and return its path
pub fn synth(stack: &dyn Stack, out_dir: &Path, format: TemplateFormat) -> Result<PathBuf> {
    let rendered = stack.template()?.render(format)?;

    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{}.template.{}", stack.name(), format.extension()));
    fs::write(&path, rendered)?;

    info!(stack = %stack.name(), path = %path.display(), "Template written");
    Ok(path)
}
