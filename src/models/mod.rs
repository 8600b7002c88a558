//! Domain model: articles, events, and the source registry.

pub mod article;
pub mod event;
pub mod source;

pub use article::{
    Article, ArticleRow, FactCheckFlag, FactCheckStatus, NewArticle, RawArticle,
};
pub use event::{
    BiasCompass, Category, ConfidenceTier, ConflictExplanation, ConflictSeverity,
    DifferenceType, Event, EventRow, InternationalCoverage, Perspective, ScoreComponent,
    ScoringBreakdown, Sentiment,
};
pub use source::{PoliticalBias, Region, SourceProfile, SourceRegistry, ToneBias};
