//! In-memory `TabularStore` with fault injection

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tabula_codec::CellRange;
use tabula_repository::{RangeUpdate, StoreError, TableId, TabularStore};

/// Store operations, for counters and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetRange,
    AppendRow,
    UpdateRange,
    BatchUpdate,
    DescribeTable,
    DeleteRow,
}

type RowsHook = Box<dyn FnOnce(&mut Vec<Vec<String>>) + Send>;

struct MemoryTable {
    id: TableId,
    /// Physical rows; index 0 is row 1 (the header)
    rows: Vec<Vec<String>>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    next_id: TableId,
    failures: HashMap<StoreOp, VecDeque<StoreError>>,
    calls: HashMap<StoreOp, usize>,
    unconfirmed_appends: bool,
    after_next_read: Option<(String, RowsHook)>,
}

impl State {
    fn begin(&mut self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }
}

/// Header-aware in-memory spreadsheet
///
/// Reads behave like the real API: trailing empty cells and trailing empty
/// rows are omitted. Appends land after the last row with data.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryStore")
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .field("calls", &state.calls)
            .finish_non_exhaustive()
    }
}

fn cells<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().to_string()).collect()
}

fn trim_row(mut row: Vec<String>) -> Vec<String> {
    while row.last().is_some_and(String::is_empty) {
        row.pop();
    }
    row
}

fn row_index(row: u32) -> usize {
    usize::try_from(row.saturating_sub(1)).unwrap_or(usize::MAX)
}

fn write_row(
    rows: &mut Vec<Vec<String>>,
    range: &CellRange,
    values: Vec<String>,
) -> Result<(), StoreError> {
    let Some(row) = range.start_row() else {
        return Err(StoreError::remote(400, format!("range {range} has no row")));
    };
    let index = row_index(row);
    if rows.len() <= index {
        rows.resize_with(index + 1, Vec::new);
    }
    let target = &mut rows[index];
    let start = range.start_column();
    if target.len() < start + values.len() {
        target.resize(start + values.len(), String::new());
    }
    for (offset, value) in values.into_iter().enumerate() {
        target[start + offset] = value;
    }
    Ok(())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add_table`](Self::add_table)
    #[must_use]
    pub fn with_table<S: AsRef<str>>(self, name: &str, header: &[S]) -> Self {
        self.add_table(name, header);
        self
    }

    /// Create (or reset) `name` with a header row
    pub fn add_table<S: AsRef<str>>(&self, name: &str, header: &[S]) {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = 1000 + state.next_id;
        state.tables.insert(
            name.to_string(),
            MemoryTable {
                id,
                rows: vec![cells(header)],
            },
        );
    }

    /// Append a data row directly, without counting a call
    pub fn insert_row<S: AsRef<str>>(&self, table: &str, values: &[S]) {
        let mut state = self.state.lock();
        let table = state.table_mut(table).unwrap();
        table.rows.push(cells(values));
    }

    /// Append an empty row that still occupies a position
    pub fn insert_blank_row(&self, table: &str) {
        let mut state = self.state.lock();
        state.table_mut(table).unwrap().rows.push(Vec::new());
    }

    /// Data rows (row 2 onwards) as stored, trailing empty cells trimmed
    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        let state = self.state.lock();
        state.tables[table]
            .rows
            .iter()
            .skip(1)
            .cloned()
            .map(trim_row)
            .collect()
    }

    /// Header row
    pub fn header(&self, table: &str) -> Vec<String> {
        let state = self.state.lock();
        state.tables[table].rows.first().cloned().unwrap_or_default()
    }

    /// Internal id of `table`
    pub fn table_id(&self, table: &str) -> TableId {
        self.state.lock().tables[table].id
    }

    /// Fail the next call of `op` with `err`; queued failures apply in order
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.state.lock().failures.entry(op).or_default().push_back(err);
    }

    /// Answer the next `times` calls of `op` with a 429
    pub fn rate_limit_next(&self, op: StoreOp, times: usize) {
        for _ in 0..times {
            self.fail_next(
                op,
                StoreError::remote(429, "Quota exceeded for quota metric 'Read requests'"),
            );
        }
    }

    /// When `false`, appends are applied but not echoed back
    pub fn set_confirm_appends(&self, confirm: bool) {
        self.state.lock().unconfirmed_appends = !confirm;
    }

    /// Edit `table` right after the next read returns, as another writer would
    pub fn mutate_after_next_read(
        &self,
        table: &str,
        hook: impl FnOnce(&mut Vec<Vec<String>>) + Send + 'static,
    ) {
        self.state.lock().after_next_read = Some((table.to_string(), Box::new(hook)));
    }

    /// Calls of `op` so far, failed ones included
    pub fn calls(&self, op: StoreOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or_default()
    }

    /// Calls of every mutating operation
    pub fn writes(&self) -> usize {
        [
            StoreOp::AppendRow,
            StoreOp::UpdateRange,
            StoreOp::BatchUpdate,
            StoreOp::DeleteRow,
        ]
        .into_iter()
        .map(|op| self.calls(op))
        .sum()
    }
}

#[async_trait]
impl TabularStore for InMemoryStore {
    async fn get_range(&self, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError> {
        let mut state = self.state.lock();
        state.begin(StoreOp::GetRange)?;
        let table = state.table_mut(range.table())?;

        let first = row_index(range.start_row().unwrap_or(1));
        let last = range
            .end_row()
            .map_or(table.rows.len(), |row| row_index(row) + 1)
            .min(table.rows.len());
        let columns = range.start_column()..=range.end_column();

        let mut result: Vec<Vec<String>> = table
            .rows
            .get(first..last)
            .unwrap_or_default()
            .iter()
            .map(|row| {
                let cells = row
                    .iter()
                    .enumerate()
                    .filter(|(column, _)| columns.contains(column))
                    .map(|(_, cell)| cell.clone())
                    .collect();
                trim_row(cells)
            })
            .collect();
        while result.last().is_some_and(Vec::is_empty) {
            result.pop();
        }

        let hook = match state.after_next_read.take() {
            Some((name, hook)) if name == range.table() => Some(hook),
            other => {
                state.after_next_read = other;
                None
            }
        };
        if let Some(hook) = hook {
            hook(&mut state.table_mut(range.table())?.rows);
        }
        Ok(result)
    }

    async fn append_row(
        &self,
        anchor: &CellRange,
        values: Vec<String>,
    ) -> Result<Option<Vec<String>>, StoreError> {
        let mut state = self.state.lock();
        state.begin(StoreOp::AppendRow)?;
        let unconfirmed = state.unconfirmed_appends;
        let table = state.table_mut(anchor.table())?;

        while table.rows.len() > 1
            && table
                .rows
                .last()
                .is_some_and(|row| row.iter().all(String::is_empty))
        {
            table.rows.pop();
        }
        let echoed = trim_row(values.clone());
        table.rows.push(values);
        Ok((!unconfirmed).then_some(echoed))
    }

    async fn update_range(&self, range: &CellRange, values: Vec<String>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.begin(StoreOp::UpdateRange)?;
        let table = state.table_mut(range.table())?;
        write_row(&mut table.rows, range, values)
    }

    async fn batch_update(
        &self,
        table: &str,
        updates: Vec<RangeUpdate>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.begin(StoreOp::BatchUpdate)?;
        let target = state.table_mut(table)?;
        let mut cells = 0_u64;
        for update in updates {
            if update.range.table() != table {
                let message = format!("range {} outside {table}", update.range);
                return Err(StoreError::remote(400, message));
            }
            cells += update.values.len() as u64;
            write_row(&mut target.rows, &update.range, update.values)?;
        }
        Ok(cells)
    }

    async fn describe_table(&self, table: &str) -> Result<TableId, StoreError> {
        let mut state = self.state.lock();
        state.begin(StoreOp::DescribeTable)?;
        Ok(state.table_mut(table)?.id)
    }

    async fn delete_row(&self, table: &str, table_id: TableId, row: u32) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.begin(StoreOp::DeleteRow)?;
        let target = state.table_mut(table)?;
        if target.id != table_id {
            return Err(StoreError::remote(404, format!("No grid with id: {table_id}")));
        }
        let index = row_index(row);
        if index == 0 || index >= target.rows.len() {
            return Err(StoreError::remote(400, format!("row {row} out of range")));
        }
        target.rows.remove(index);
        Ok(())
    }
}
