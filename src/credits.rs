//! Usage Accounting
//!
//! Each logical operation costs a fixed number of credits, debited when the
//! call is dispatched. The debit stands even if the remote call later fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FindLeads,
    LookupWebsite,
    AnalyzeBrand,
    GenerateConceptImage,
    ExtractSpec,
    BuildWebsite,
    EditWebsite,
    VerifyWebsite,
    FixIssues,
    DraftPitchEmail,
}

impl Operation {
    pub fn credits(self) -> u32 {
        match self {
            Operation::FindLeads => 5,
            Operation::LookupWebsite => 1,
            Operation::AnalyzeBrand => 2,
            Operation::GenerateConceptImage => 10,
            Operation::ExtractSpec => 3,
            Operation::BuildWebsite => 8,
            Operation::EditWebsite => 2,
            Operation::VerifyWebsite => 3,
            Operation::FixIssues => 5,
            Operation::DraftPitchEmail => 1,
        }
    }

    /// Operations that need a paid capability selected before dispatch.
    pub fn requires_capability(self) -> bool {
        matches!(self, Operation::GenerateConceptImage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub operation: Operation,
    pub credits: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageLedger {
    pub entries: Vec<LedgerEntry>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one debit for `op` and return the entry.
    pub fn debit(&mut self, op: Operation) -> &LedgerEntry {
        self.entries.push(LedgerEntry {
            id: Uuid::new_v4(),
            operation: op,
            credits: op.credits(),
            at: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn total_debited(&self) -> u64 {
        self.entries.iter().map(|e| e.credits as u64).sum()
    }

    pub fn count(&self, op: Operation) -> usize {
        self.entries.iter().filter(|e| e.operation == op).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
