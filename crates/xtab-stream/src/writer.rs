use xtab_core::{Case, CaseProto, XtabError, XtabResult};

use crate::reader::CaseReader;

/// Collects cases in memory for later reading.
#[derive(Debug)]
pub struct CaseWriter {
    proto: CaseProto,
    cases: Vec<Case>,
}

impl CaseWriter {
    pub fn new(proto: CaseProto) -> Self {
        Self {
            proto,
            cases: Vec::new(),
        }
    }

    /// Appends `case`, which must match the writer's prototype.
    pub fn write(&mut self, case: Case) -> XtabResult<()> {
        if !self.proto.conforms(case.values()) {
            return Err(XtabError::Internal(format!(
                "case of {} values written to a {}-slot writer",
                case.len(),
                self.proto.len()
            )));
        }
        self.cases.push(case);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Turns the written cases into a reader that forks without buffering.
    pub fn into_reader(self) -> CaseReader {
        CaseReader::from_cases(self.proto, self.cases)
    }
}
