//! Pipeline definitions and loading.
//!
//! Pipelines are defined in YAML and consist of ordered stages. A stage
//! is either a single task or a parallel group of tasks whose outputs are
//! joined before the next stage runs.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (the label used by batches and the HTTP surface)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// How prior stage outputs reach the next stage
    #[serde(default)]
    pub context: ContextMode,

    /// Keys to keep in the final result (everything when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,

    /// Ordered list of stages to execute
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Build a pipeline in code
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            context: ContextMode::default(),
            outputs: None,
            stages,
        }
    }

    /// A one-stage pipeline around a single backend task
    pub fn single(name: impl Into<String>, task: impl Into<String>) -> Self {
        Self::new(name, vec![Stage::Single(TaskSpec::new(task))])
    }

    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to load pipeline file: {}", path.display()))
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.is_empty() {
            return Err(self.invalid("pipeline name cannot be empty"));
        }

        if self.stages.is_empty() {
            return Err(self.invalid("pipeline must have at least one stage"));
        }

        for (idx, stage) in self.stages.iter().enumerate() {
            match stage {
                Stage::Single(task) => {
                    if task.task.is_empty() {
                        return Err(self.invalid(format!("stage {} has an empty task name", idx)));
                    }
                }
                Stage::Parallel(group) => {
                    if group.members.is_empty() {
                        return Err(self.invalid(format!(
                            "parallel stage '{}' has no members",
                            stage.label(idx)
                        )));
                    }

                    let mut seen = Vec::with_capacity(group.members.len());
                    for member in &group.members {
                        if member.task.is_empty() {
                            return Err(self.invalid(format!(
                                "parallel stage '{}' has a member with an empty task name",
                                stage.label(idx)
                            )));
                        }
                        let key = member.output_key();
                        if seen.contains(&key) {
                            return Err(self.invalid(format!(
                                "parallel stage '{}' declares output key '{}' more than once",
                                stage.label(idx),
                                key
                            )));
                        }
                        seen.push(key);
                    }
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::Invalid {
            pipeline: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// One step of a pipeline
///
/// YAML forms:
/// - Single: `{ task: general_health_agent, output_key: general_health_report }`
/// - Parallel: `{ parallel: [ { task: a }, { task: b } ], on_partial_failure: degrade }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stage {
    /// Members run concurrently and are joined before the next stage
    Parallel(ParallelGroup),

    /// One task; its state merges into the context, namespaced under
    /// `output_key` when one is set
    Single(TaskSpec),
}

impl Stage {
    /// Name used in logs and errors
    pub fn label(&self, index: usize) -> String {
        match self {
            Stage::Single(task) => task.task.clone(),
            Stage::Parallel(group) => group
                .name
                .clone()
                .unwrap_or_else(|| format!("parallel[{}]", index)),
        }
    }
}

/// A task and the key its output is stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Backend task (app) name
    pub task: String,

    /// Output key. In a parallel group it defaults to the task name; a
    /// single stage without one merges every key of its state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl TaskSpec {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            output_key: None,
        }
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Key this task's output is merged under
    pub fn output_key(&self) -> &str {
        self.output_key.as_deref().unwrap_or(&self.task)
    }
}

/// A set of tasks executed concurrently
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelGroup {
    /// Optional label for logs and errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Members; output keys must be disjoint
    #[serde(rename = "parallel")]
    pub members: Vec<TaskSpec>,

    /// What to do when some (but not all) members fail
    #[serde(default)]
    pub on_partial_failure: PartialFailurePolicy,
}

impl ParallelGroup {
    pub fn new(members: Vec<TaskSpec>) -> Self {
        Self {
            name: None,
            members,
            on_partial_failure: PartialFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PartialFailurePolicy) -> Self {
        self.on_partial_failure = policy;
        self
    }
}

/// Policy for a parallel group with some failed members.
/// A group where every member failed always aborts the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailurePolicy {
    /// Continue with the surviving members' keys
    #[default]
    Degrade,

    /// Abort the pipeline on any member failure
    Abort,
}

/// How accumulated context is handed to the next stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Seed the new session's state with the context
    #[default]
    SessionState,

    /// Append the context to the input text
    Prompt,
}

/// Label that addresses the whole set on the HTTP surface
pub const RESERVED_LABEL: &str = "all";

/// Labeled pipelines, as run together by a batch
#[derive(Debug, Clone, Default)]
pub struct PipelineSet {
    pipelines: BTreeMap<String, Pipeline>,
}

impl PipelineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` file in a directory
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut set = Self::new();

        for ext in ["yaml", "yml"] {
            let pattern = dir.join(format!("*.{}", ext));
            let pattern = pattern.to_string_lossy();
            let paths = glob::glob(&pattern)
                .with_context(|| format!("Invalid pipeline glob: {}", pattern))?;

            for entry in paths {
                let path = entry.context("Failed to read pipeline directory entry")?;
                let pipeline = Pipeline::from_file(&path)?;
                pipeline
                    .validate()
                    .with_context(|| format!("Invalid pipeline file: {}", path.display()))?;
                set.insert(pipeline)?;
            }
        }

        Ok(set)
    }

    /// Add a pipeline under its name; labels must be unique
    pub fn insert(&mut self, pipeline: Pipeline) -> Result<()> {
        if pipeline.name == RESERVED_LABEL {
            anyhow::bail!(
                "Pipeline label '{}' is reserved for running every pipeline",
                RESERVED_LABEL
            );
        }
        if self.pipelines.contains_key(&pipeline.name) {
            anyhow::bail!("Duplicate pipeline label '{}'", pipeline.name);
        }
        self.pipelines.insert(pipeline.name.clone(), pipeline);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&Pipeline> {
        self.pipelines.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pipeline)> {
        self.pipelines.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
