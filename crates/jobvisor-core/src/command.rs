use crate::config::ToolPaths;
use crate::process::{CommandLine, ProcessHandle};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Parameters of a traffic-breakdown (conversation statistics) job
#[derive(Default, Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParams {
    /// Breakdown categories, e.g. `eth`, `ip`, `tcp`
    #[builder(setter(custom))]
    pub categories: Vec<String>,
    /// Display filter applied to every category; empty means none
    pub filter: String,
    /// Report absolute timestamps (`-t a`)
    pub absolute_time: bool,
    /// Resolve names; when false `-n` is passed
    pub resolve_names: bool,
}

impl ConversationParams {
    pub fn builder() -> ConversationParamsBuilder {
        ConversationParamsBuilder::default()
    }
}

impl ConversationParamsBuilder {
    pub fn categories<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        self.categories = Some(iter.into_iter().map(|s| s.to_string()).collect());
        self
    }
}

/// Job-specific parameters, one variant per job kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JobParams {
    /// Summary statistics of a capture file
    Summary,
    /// Traffic breakdown of a capture file
    Conversations(ConversationParams),
    /// Registered protocol and field names of the analysis tool
    FieldList,
}

impl JobParams {
    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::Summary => JobKind::Summary,
            JobParams::Conversations(_) => JobKind::Conversations,
            JobParams::FieldList => JobKind::FieldList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Summary,
    Conversations,
    FieldList,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::Summary => "summary",
            JobKind::Conversations => "conversations",
            JobKind::FieldList => "field-list",
        };
        f.write_str(name)
    }
}

/// Argument construction for every job kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCommands {
    tools: ToolPaths,
}

impl ToolCommands {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    /// Command line for a job; `target` is ignored by jobs that read no file
    pub fn command_line(&self, target: &Path, params: &JobParams) -> CommandLine {
        let target = target.display().to_string();
        match params {
            JobParams::Summary => CommandLine::new(&self.tools.capinfos, [target]),
            JobParams::Conversations(conv) => {
                let mut args = vec!["-q".to_string(), "-r".to_string(), target];
                if conv.absolute_time {
                    args.extend(["-t".to_string(), "a".to_string()]);
                }
                if !conv.resolve_names {
                    args.push("-n".to_string());
                }
                for category in &conv.categories {
                    args.push("-z".to_string());
                    if conv.filter.is_empty() {
                        args.push(format!("conv,{category}"));
                    } else {
                        args.push(format!("conv,{category},{}", conv.filter));
                    }
                }
                CommandLine::new(&self.tools.tshark, args)
            }
            JobParams::FieldList => CommandLine::new(&self.tools.tshark, ["-G", "fields"]),
        }
    }
}

/// Creates unstarted process handles for jobs
///
/// `build` must not start anything and must return handles with identical
/// command lines for identical inputs.
pub trait CommandBuilder: Send + Sync + 'static {
    type Handle: ProcessHandle;

    fn build(&self, target: &Path, params: &JobParams) -> Self::Handle;
}
