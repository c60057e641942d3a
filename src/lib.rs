//! Answer evaluation core for AI mock interviews.
//!
//! One spoken or written answer fans out to independent analyzers — fluency,
//! tone, coherence, content correctness, and prosody — whose results are
//! combined into weighted criterion scores and prioritized recommendations.
//!
//! The pipeline talks to external models only through the capability traits
//! in [`capabilities`], so every analyzer is testable with in-process doubles
//! and vendors can be swapped without touching scoring logic.
//!
//! ```no_run
//! use viva::{Config, QuestionType, Utterance};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let evaluator = Config::from_env()?.build_evaluator()?;
//! let utterance = Utterance::new(
//!     "Caching reduces latency. It also lowers database load.",
//!     25.0,
//!     "How would you speed up a read-heavy service?",
//!     QuestionType::Technical,
//! )?;
//! let report = evaluator.evaluate(&utterance).await?;
//! println!("{}", report.weighted_overall);
//! # Ok(())
//! # }
//! ```

pub mod analyzers;
pub mod capabilities;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod text;

pub use config::Config;
pub use errors::EvalError;
pub use models::{AnswerContext, QuestionType, Utterance};
pub use pipeline::Evaluator;
pub use report::{
    Criterion, CriterionScores, EvaluationReport, Priority, QuickFeedback, Recommendation,
    ScoreWeights, SpokenReport,
};
