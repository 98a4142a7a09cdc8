//! Breakpoint management for DAP sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::protocol::{BreakpointResponse, InstructionBreakpoint, SourceBreakpoint};

/// Where a breakpoint is placed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BreakpointLocation {
    /// Source file and 1-based line.
    Source {
        /// Source file path.
        path: PathBuf,
        /// Line number (1-based).
        line: i64,
    },
    /// Instruction address.
    Address(u64),
}

impl std::fmt::Display for BreakpointLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakpointLocation::Source { path, line } => write!(f, "{}:{line}", path.display()),
            BreakpointLocation::Address(addr) => write!(f, "{addr:#010x}"),
        }
    }
}

/// A client-side breakpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    /// Requested location; the line follows the adapter if it moves it.
    pub location: BreakpointLocation,
    /// Whether the adapter has verified this breakpoint.
    pub verified: bool,
    /// Adapter-assigned ID (set after adapter response).
    pub adapter_id: Option<i64>,
    /// Why the adapter could not verify it, if it said.
    pub message: Option<String>,
}

impl Breakpoint {
    /// Create a new unverified breakpoint at the given path and line.
    pub fn source(path: PathBuf, line: i64) -> Self {
        Self::at(BreakpointLocation::Source { path, line })
    }

    /// Create a new unverified breakpoint at an instruction address.
    pub fn address(address: u64) -> Self {
        Self::at(BreakpointLocation::Address(address))
    }

    fn at(location: BreakpointLocation) -> Self {
        Self {
            location,
            verified: false,
            adapter_id: None,
            message: None,
        }
    }

    fn apply(&mut self, response: &BreakpointResponse) {
        self.verified = response.verified;
        if response.id.is_some() {
            self.adapter_id = response.id;
        }
        self.message = response.message.clone();
        if let (BreakpointLocation::Source { line, .. }, Some(actual)) =
            (&mut self.location, response.line)
        {
            *line = actual;
        }
    }

    fn invalidate(&mut self) {
        self.verified = false;
        self.adapter_id = None;
        self.message = None;
    }
}

/// Manages breakpoints across files for a debug session.
///
/// Every `setBreakpoints` call replaces the whole set for one file, which
/// is how the adapter treats it too.
#[derive(Debug, Clone, Default)]
pub struct BreakpointManager {
    source: HashMap<PathBuf, Vec<Breakpoint>>,
    instruction: Vec<Breakpoint>,
    /// Seq of the latest `setBreakpoints` sent per file.
    file_requests: HashMap<PathBuf, i64>,
    /// Seq of the latest `setInstructionBreakpoints`.
    instruction_request: Option<i64>,
}

impl BreakpointManager {
    /// Create a new empty breakpoint manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the breakpoints of `path` with unverified ones at `lines`.
    ///
    /// Returns the request entries for `setBreakpoints`.
    pub fn replace_file(&mut self, path: &Path, lines: &[i64]) -> Vec<SourceBreakpoint> {
        if lines.is_empty() {
            self.source.remove(path);
        } else {
            let list = lines
                .iter()
                .map(|&line| Breakpoint::source(path.to_path_buf(), line))
                .collect();
            self.source.insert(path.to_path_buf(), list);
        }
        lines
            .iter()
            .map(|&line| SourceBreakpoint {
                line,
                column: None,
                condition: None,
            })
            .collect()
    }

    /// Record that `seq` is the `setBreakpoints` request now owning `path`.
    pub fn track_file_request(&mut self, path: &Path, seq: i64) {
        self.file_requests.insert(path.to_path_buf(), seq);
    }

    /// Record that `seq` is the current `setInstructionBreakpoints` request.
    pub fn track_instruction_request(&mut self, seq: i64) {
        self.instruction_request = Some(seq);
    }

    /// Apply the adapter's answer to the `setBreakpoints` request `seq`
    /// for `path`.
    ///
    /// Entries are matched by position, as the protocol requires. Answers
    /// to a request superseded by a later one for the same file are
    /// ignored; returns whether the answer was applied.
    pub fn apply_file_response(
        &mut self,
        path: &Path,
        seq: i64,
        responses: &[BreakpointResponse],
    ) -> bool {
        if self.file_requests.get(path) != Some(&seq) {
            tracing::debug!(path = %path.display(), seq, "ignoring superseded breakpoint response");
            return false;
        }
        let Some(list) = self.source.get_mut(path) else {
            return true;
        };
        if list.len() != responses.len() {
            tracing::warn!(
                path = %path.display(),
                requested = list.len(),
                answered = responses.len(),
                "breakpoint response length mismatch"
            );
        }
        for (bp, response) in list.iter_mut().zip(responses) {
            bp.apply(response);
        }
        true
    }

    /// Replace all instruction breakpoints.
    pub fn replace_instructions(&mut self, addresses: &[u64]) -> Vec<InstructionBreakpoint> {
        self.instruction = addresses.iter().map(|&a| Breakpoint::address(a)).collect();
        addresses
            .iter()
            .map(|a| InstructionBreakpoint {
                instruction_reference: format!("{a:#x}"),
                offset: None,
                condition: None,
            })
            .collect()
    }

    /// Apply the adapter's answer to the `setInstructionBreakpoints`
    /// request `seq`, unless a later request replaced it.
    pub fn apply_instruction_response(&mut self, seq: i64, responses: &[BreakpointResponse]) -> bool {
        if self.instruction_request != Some(seq) {
            tracing::debug!(seq, "ignoring superseded instruction breakpoint response");
            return false;
        }
        for (bp, response) in self.instruction.iter_mut().zip(responses) {
            bp.apply(response);
        }
        true
    }

    /// Update the breakpoint the adapter identifies by `response.id`.
    ///
    /// Returns `false` when no tracked breakpoint carries that id.
    pub fn update_from_event(&mut self, response: &BreakpointResponse) -> bool {
        let Some(id) = response.id else {
            return false;
        };
        match self.iter_mut().find(|bp| bp.adapter_id == Some(id)) {
            Some(bp) => {
                bp.apply(response);
                true
            }
            None => false,
        }
    }

    /// Forget the breakpoint with adapter id `id`.
    pub fn remove_by_id(&mut self, id: i64) -> bool {
        let mut removed = false;
        for list in self.source.values_mut() {
            let before = list.len();
            list.retain(|bp| bp.adapter_id != Some(id));
            removed |= list.len() != before;
        }
        self.source.retain(|_, list| !list.is_empty());
        let before = self.instruction.len();
        self.instruction.retain(|bp| bp.adapter_id != Some(id));
        removed || self.instruction.len() != before
    }

    /// Mark every breakpoint unverified; ids die with the session.
    pub fn invalidate_all(&mut self) {
        for bp in self.iter_mut() {
            bp.invalidate();
        }
    }

    /// Get all breakpoints for a file.
    pub fn get_for_file(&self, path: &Path) -> &[Breakpoint] {
        self.source.get(path).map_or(&[], |v| v.as_slice())
    }

    /// Current instruction breakpoints.
    pub fn instruction_breakpoints(&self) -> &[Breakpoint] {
        &self.instruction
    }

    /// Return an iterator over all breakpoints, files first.
    pub fn all(&self) -> impl Iterator<Item = &Breakpoint> {
        self.source
            .values()
            .flat_map(|v| v.iter())
            .chain(self.instruction.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Breakpoint> {
        self.source
            .values_mut()
            .flat_map(|v| v.iter_mut())
            .chain(self.instruction.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_path(name: &str) -> PathBuf {
        PathBuf::from(format!("/src/{name}"))
    }

    fn answer(id: i64, verified: bool, line: Option<i64>) -> BreakpointResponse {
        BreakpointResponse {
            id: Some(id),
            verified,
            message: None,
            source: None,
            line,
            column: None,
            instruction_reference: None,
        }
    }

    #[test]
    fn breakpoint_replace_and_verify() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("main.rs");

        let request = mgr.replace_file(&path, &[10, 20]);
        mgr.track_file_request(&path, 1);
        assert_eq!(request.len(), 2);
        assert_eq!(request[1].line, 20);
        assert!(mgr.get_for_file(&path).iter().all(|bp| !bp.verified));

        assert!(mgr.apply_file_response(&path, 1, &[answer(1, true, Some(10)), answer(2, false, None)]));

        let bps = mgr.get_for_file(&path);
        assert!(bps[0].verified);
        assert_eq!(bps[0].adapter_id, Some(1));
        assert!(!bps[1].verified);
        assert_eq!(bps[1].adapter_id, Some(2));
    }

    #[test]
    fn breakpoint_adapter_moves_line() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("main.rs");
        mgr.replace_file(&path, &[11]);
        mgr.track_file_request(&path, 4);
        mgr.apply_file_response(&path, 4, &[answer(1, true, Some(13))]);
        assert_eq!(
            mgr.get_for_file(&path)[0].location,
            BreakpointLocation::Source { path: path.clone(), line: 13 }
        );
    }

    #[test]
    fn breakpoint_resync_replaces_file() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("main.rs");
        mgr.replace_file(&path, &[10]);
        mgr.track_file_request(&path, 1);
        mgr.apply_file_response(&path, 1, &[answer(1, true, None)]);

        mgr.replace_file(&path, &[30]);
        let bps = mgr.get_for_file(&path);
        assert_eq!(bps.len(), 1);
        assert!(!bps[0].verified);
        assert_eq!(bps[0].adapter_id, None);

        mgr.replace_file(&path, &[]);
        assert!(mgr.get_for_file(&path).is_empty());
        assert_eq!(mgr.all().count(), 0);
    }

    #[test]
    fn breakpoint_event_updates_by_id() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("main.rs");
        mgr.replace_file(&path, &[10]);
        mgr.track_file_request(&path, 1);
        mgr.apply_file_response(&path, 1, &[answer(7, false, None)]);

        assert!(mgr.update_from_event(&answer(7, true, None)));
        assert!(mgr.get_for_file(&path)[0].verified);
        assert!(!mgr.update_from_event(&answer(99, true, None)));
    }

    #[test]
    fn breakpoint_remove_by_id() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("lib.rs");
        mgr.replace_file(&path, &[1, 2]);
        mgr.track_file_request(&path, 1);
        mgr.apply_file_response(&path, 1, &[answer(1, true, None), answer(2, true, None)]);

        assert!(mgr.remove_by_id(1));
        assert_eq!(mgr.get_for_file(&path).len(), 1);
        assert!(!mgr.remove_by_id(1));
        assert!(mgr.remove_by_id(2));
        assert!(mgr.get_for_file(&path).is_empty());
    }

    #[test]
    fn breakpoint_instruction_addresses() {
        let mut mgr = BreakpointManager::new();
        let request = mgr.replace_instructions(&[0x0800_0400, 0x0800_0500]);
        assert_eq!(request[0].instruction_reference, "0x8000400");
        mgr.track_instruction_request(2);
        assert!(mgr.apply_instruction_response(2, &[answer(3, true, None), answer(4, true, None)]));
        let bps = mgr.instruction_breakpoints();
        assert_eq!(bps[0].location, BreakpointLocation::Address(0x0800_0400));
        assert!(bps.iter().all(|bp| bp.verified));
        assert_eq!(bps[0].location.to_string(), "0x08000400");
    }

    #[test]
    fn breakpoint_invalidate_all() {
        let mut mgr = BreakpointManager::new();
        let path_a = test_path("a.rs");
        mgr.replace_file(&path_a, &[1]);
        mgr.track_file_request(&path_a, 1);
        mgr.apply_file_response(&path_a, 1, &[answer(1, true, None)]);
        mgr.replace_instructions(&[0x100]);
        mgr.track_instruction_request(2);
        mgr.apply_instruction_response(2, &[answer(2, true, None)]);

        mgr.invalidate_all();
        assert_eq!(mgr.all().count(), 2);
        assert!(mgr.all().all(|bp| !bp.verified && bp.adapter_id.is_none()));
    }

    #[test]
    fn breakpoint_superseded_response_is_ignored() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("main.rs");
        mgr.replace_file(&path, &[10]);
        mgr.track_file_request(&path, 1);
        mgr.replace_file(&path, &[20, 30]);
        mgr.track_file_request(&path, 2);

        // The answer to the first request arrives after the second was sent.
        assert!(!mgr.apply_file_response(&path, 1, &[answer(1, true, Some(10))]));
        let bps = mgr.get_for_file(&path);
        assert_eq!(bps.len(), 2);
        assert!(bps.iter().all(|bp| bp.adapter_id.is_none()));
        assert_eq!(
            bps[0].location,
            BreakpointLocation::Source { path: path.clone(), line: 20 }
        );

        assert!(mgr.apply_file_response(
            &path,
            2,
            &[answer(2, true, None), answer(3, true, Some(31))]
        ));
        let bps = mgr.get_for_file(&path);
        assert_eq!(bps[0].adapter_id, Some(2));
        assert_eq!(
            bps[1].location,
            BreakpointLocation::Source { path: path.clone(), line: 31 }
        );
    }

    #[test]
    fn breakpoint_superseded_instruction_response_is_ignored() {
        let mut mgr = BreakpointManager::new();
        mgr.replace_instructions(&[0x100]);
        mgr.track_instruction_request(1);
        mgr.replace_instructions(&[0x200]);
        mgr.track_instruction_request(2);
        assert!(!mgr.apply_instruction_response(1, &[answer(5, true, None)]));
        assert!(!mgr.instruction_breakpoints()[0].verified);
    }

    #[test]
    fn breakpoint_source_location_display() {
        let bp = Breakpoint::source(PathBuf::from("/src/main.rs"), 42);
        assert_eq!(bp.location.to_string(), "/src/main.rs:42");
    }
}
