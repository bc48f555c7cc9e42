//! Result model: fields, rows, result sets and prepared statements.

use bytes::Bytes;
use std::borrow::Cow;

use mysql_protocol::response::ColumnDefinition;
use mysql_protocol::types::{ColumnType, FieldFlags};
use mysql_protocol::ServerStatus;

/// A result-set column descriptor.
#[derive(Debug, Clone, Default)]
pub struct Field {
    catalog: String,
    schema: String,
    table: String,
    org_table: String,
    name: String,
    org_name: String,
    character_set: u16,
    column_length: u32,
    type_code: u8,
    flags: FieldFlags,
    decimals: u8,
}

impl Field {
    pub(crate) fn from_definition(def: ColumnDefinition) -> Self {
        Self {
            catalog: def.catalog,
            schema: def.schema,
            table: def.table,
            org_table: def.org_table,
            name: def.name,
            org_name: def.org_name,
            character_set: def.character_set,
            column_length: def.column_length,
            type_code: def.column_type,
            flags: FieldFlags::from_bits_retain(def.flags),
            decimals: def.decimals,
        }
    }

    /// Column alias.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical column name.
    #[must_use]
    pub fn org_name(&self) -> &str {
        &self.org_name
    }

    /// Table alias.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Physical table name.
    #[must_use]
    pub fn org_table(&self) -> &str {
        &self.org_table
    }

    /// Schema (database) name.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Catalog name.
    #[must_use]
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Collation tag.
    #[must_use]
    pub fn character_set(&self) -> u16 {
        self.character_set
    }

    /// Maximum display length.
    #[must_use]
    pub fn column_length(&self) -> u32 {
        self.column_length
    }

    /// Raw type code as sent by the server.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        self.type_code
    }

    /// Typed view of the type code, when this driver knows the code.
    #[must_use]
    pub fn column_type(&self) -> Option<ColumnType> {
        ColumnType::from_u8(self.type_code)
    }

    /// Column definition flags.
    #[must_use]
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Decimal scale.
    #[must_use]
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Whether the column is NOT NULL.
    #[must_use]
    pub fn is_not_null(&self) -> bool {
        self.flags.contains(FieldFlags::NOT_NULL)
    }

    /// Whether the column is part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(FieldFlags::PRI_KEY)
    }

    /// Whether the column auto-increments.
    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.flags.contains(FieldFlags::AUTO_INCREMENT)
    }

    /// Whether the column is unsigned.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(FieldFlags::UNSIGNED)
    }
}

/// One result row: an ordered sequence of optional byte strings.
///
/// An absent value is SQL NULL. The typed accessors coerce the text
/// representation and fall back to a default when the cell is NULL,
/// missing or unparsable.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: Vec<Option<Bytes>>,
}

impl Row {
    pub(crate) fn new(values: Vec<Option<Bytes>>) -> Self {
        Self { values }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw cell bytes; `None` for SQL NULL or an out-of-range index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Whether the cell is SQL NULL (out-of-range indexes count as NULL).
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.get(index).is_none()
    }

    /// Cell as text; `None` for NULL.
    #[must_use]
    pub fn get_str(&self, index: usize) -> Option<Cow<'_, str>> {
        self.get(index).map(String::from_utf8_lossy)
    }

    /// Cell as an owned string; empty for NULL.
    #[must_use]
    pub fn get_string(&self, index: usize) -> String {
        self.get_str(index).map(Cow::into_owned).unwrap_or_default()
    }

    /// Cell as a signed integer; 0 for NULL or parse failure.
    #[must_use]
    pub fn get_i64(&self, index: usize) -> i64 {
        self.get_str(index)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Cell as an unsigned integer; 0 for NULL or parse failure.
    #[must_use]
    pub fn get_u64(&self, index: usize) -> u64 {
        self.get_str(index)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Cell as a double; 0.0 for NULL or parse failure.
    #[must_use]
    pub fn get_f64(&self, index: usize) -> f64 {
        self.get_str(index)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0)
    }

    /// All cells.
    #[must_use]
    pub fn values(&self) -> &[Option<Bytes>] {
        &self.values
    }
}

/// A complete command response: column descriptors, rows and the
/// metadata of the terminal OK/EOF packet.
///
/// A result set with zero fields is the OK response to a non-SELECT
/// command.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    fields: Vec<Field>,
    rows: Vec<Row>,
    affected_rows: u64,
    last_insert_id: u64,
    warnings: u16,
    status_flags: ServerStatus,
    info: String,
}

impl ResultSet {
    pub(crate) fn with_row_hint(hint: usize) -> Self {
        let mut result = Self::default();
        if hint > 0 {
            result.rows.reserve(hint);
        }
        result
    }

    pub(crate) fn reserve_fields(&mut self, n: usize) {
        self.fields.reserve(n);
    }

    pub(crate) fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub(crate) fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub(crate) fn set_ok_metadata(
        &mut self,
        affected_rows: u64,
        last_insert_id: u64,
        warnings: u16,
        status_flags: ServerStatus,
        info: String,
    ) {
        self.affected_rows = affected_rows;
        self.last_insert_id = last_insert_id;
        self.warnings = warnings;
        self.status_flags = status_flags;
        self.info = info;
    }

    pub(crate) fn set_terminal_status(&mut self, warnings: u16, status_flags: ServerStatus) {
        self.warnings = warnings;
        self.status_flags = status_flags;
    }

    /// Column descriptors.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of columns.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Index of the column named `name`, if any.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row at `index`, if any.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Whether the response carried column definitions (i.e. was a
    /// result set rather than a bare OK).
    #[must_use]
    pub fn has_result_set(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Rows changed/deleted/inserted by the command.
    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Auto-increment id assigned by the command.
    #[must_use]
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    /// Warning count from the terminal packet.
    #[must_use]
    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    /// Server status word from the terminal packet.
    #[must_use]
    pub fn status_flags(&self) -> ServerStatus {
        self.status_flags
    }

    /// Info string from the terminal OK packet, verbatim.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Whether the server announced further result sets. This driver
    /// does not fetch them.
    #[must_use]
    pub fn more_results(&self) -> bool {
        self.status_flags.contains(ServerStatus::MORE_RESULTS_EXISTS)
    }
}

/// A prepared statement handle.
///
/// Valid until `Client::stmt_close` is issued or the connection closes;
/// executing it is idempotent with respect to the server-side statement
/// cache.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    statement_id: u32,
    params: Vec<Field>,
    columns: Vec<Field>,
}

impl PreparedStatement {
    pub(crate) fn new(statement_id: u32, params: Vec<Field>, columns: Vec<Field>) -> Self {
        Self {
            statement_id,
            params,
            columns,
        }
    }

    /// Server-assigned statement id.
    #[must_use]
    pub fn statement_id(&self) -> u32 {
        self.statement_id
    }

    /// Parameter descriptors (may be empty).
    #[must_use]
    pub fn params(&self) -> &[Field] {
        &self.params
    }

    /// Result column descriptors (may be empty).
    #[must_use]
    pub fn columns(&self) -> &[Field] {
        &self.columns
    }

    /// Number of `?` placeholders.
    #[must_use]
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// Number of result columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&[u8]>]) -> Row {
        Row::new(
            cells
                .iter()
                .map(|c| c.map(Bytes::copy_from_slice))
                .collect(),
        )
    }

    #[test]
    fn test_row_accessors() {
        let r = row(&[Some(b"42"), None, Some(b"3.5"), Some(b"not a number")]);

        assert_eq!(r.len(), 4);
        assert_eq!(r.get_string(0), "42");
        assert_eq!(r.get_i64(0), 42);
        assert_eq!(r.get_u64(0), 42);

        assert!(r.is_null(1));
        assert_eq!(r.get_string(1), "");
        assert_eq!(r.get_i64(1), 0);

        assert!((r.get_f64(2) - 3.5).abs() < f64::EPSILON);

        // Parse failure falls back to the default.
        assert_eq!(r.get_i64(3), 0);

        // Out-of-range behaves like NULL.
        assert!(r.is_null(9));
        assert_eq!(r.get_i64(9), 0);
    }

    #[test]
    fn test_negative_and_whitespace_coercion() {
        let r = row(&[Some(b"-7"), Some(b" 12 ")]);
        assert_eq!(r.get_i64(0), -7);
        assert_eq!(r.get_u64(0), 0); // negative does not parse as u64
        assert_eq!(r.get_i64(1), 12);
    }

    #[test]
    fn test_find_field() {
        let mut rs = ResultSet::default();
        let mut field = Field::default();
        field.name = "id".into();
        rs.push_field(field);
        let mut field = Field::default();
        field.name = "v".into();
        rs.push_field(field);

        assert_eq!(rs.find_field("v"), Some(1));
        assert_eq!(rs.find_field("missing"), None);
        assert!(rs.has_result_set());
    }

    #[test]
    fn test_ok_only_result() {
        let mut rs = ResultSet::default();
        rs.set_ok_metadata(1, 42, 0, ServerStatus::AUTOCOMMIT, "ok".into());
        assert!(!rs.has_result_set());
        assert_eq!(rs.affected_rows(), 1);
        assert_eq!(rs.last_insert_id(), 42);
        assert_eq!(rs.info(), "ok");
        assert!(!rs.more_results());
    }
}
