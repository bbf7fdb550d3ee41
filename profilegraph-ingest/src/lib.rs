// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Profilegraph Ingest
//!
//! Turns conversation transcripts into durable graph updates.
//!
//! ```text
//! transcript ─► ExtractionOracle ─► parser ─► validator ─► Batch
//!                                                            │
//!                                   WriterRegistry (one writer per subject)
//!                                                            │
//!          EntityResolver ─► EdgeAggregator ─► ObservationLog ─► SummaryMaintainer
//! ```
//!
//! Every batch is keyed by a content hash, so retrying a failed or repeated
//! ingestion never double counts mentions, edge observations or summary
//! totals.

pub mod actor;
pub mod batch;
pub mod cache;
pub mod edges;
pub mod llm_oracle;
pub mod observation_log;
pub mod oracle;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod service;
pub mod summary;
pub mod validator;

pub use actor::{SubjectWriterHandle, WriterRegistry, WriterRegistryConfig, WriterStats};
pub use batch::Batch;
pub use cache::{SummaryCache, SummaryCacheConfig, SummaryCacheStats};
pub use llm_oracle::{HttpExtractionOracle, OracleConfig};
pub use observation_log::ObservationLog;
pub use oracle::{
    DisabledOracle, ExtractionOracle, StaticExtractionOracle, SubjectContext, TranscriptContext,
    TranscriptTurn,
};
pub use parser::{parse_extraction, ExtractionOutput};
pub use pipeline::IngestionPipeline;
pub use report::IngestionReport;
pub use service::KnowledgeGraphService;
pub use summary::SummaryMaintainer;
pub use validator::{CandidateValidator, ValidatedCandidates};
