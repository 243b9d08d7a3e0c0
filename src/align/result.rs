//! Alignment outcome types shared by the DP kernels.

/// Edit operation for one alignment column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Match (identical residues)
    Match,
    /// Mismatch (different residues)
    Mismatch,
    /// Insertion in query (gap in subject)
    Ins,
    /// Deletion from query (gap in query)
    Del,
}

/// Raw outcome of one DP alignment. Coordinates are 0-based, ends exclusive.
#[derive(Debug, Clone)]
pub struct AlignOutcome {
    pub score: i32,
    pub q_start: usize,
    pub q_end: usize,
    pub s_start: usize,
    pub s_end: usize,
    pub ops: Vec<EditOp>,
}

/// Column statistics of an edit script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditStats {
    pub matches: usize,
    pub mismatches: usize,
    pub gap_opens: usize,
    pub gap_columns: usize,
    pub alignment_len: usize,
}

/// Count matches, mismatches, gap openings, and gap columns in an edit
/// script. A run of insertions or deletions opens exactly once.
pub fn stats_from_edit_script(ops: &[EditOp]) -> EditStats {
    let mut stats = EditStats {
        alignment_len: ops.len(),
        ..EditStats::default()
    };
    let mut prev: Option<EditOp> = None;

    for &op in ops {
        match op {
            EditOp::Match => stats.matches += 1,
            EditOp::Mismatch => stats.mismatches += 1,
            EditOp::Ins => {
                if prev != Some(EditOp::Ins) {
                    stats.gap_opens += 1;
                }
                stats.gap_columns += 1;
            }
            EditOp::Del => {
                if prev != Some(EditOp::Del) {
                    stats.gap_opens += 1;
                }
                stats.gap_columns += 1;
            }
        }
        prev = Some(op);
    }

    stats
}
