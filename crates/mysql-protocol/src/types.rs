//! Column type codes and field definition flags.

use bitflags::bitflags;

/// MySQL column type codes as they appear in column definitions and
/// `COM_STMT_EXECUTE` parameter type pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    /// Old-style decimal.
    Decimal = 0x00,
    /// TINYINT.
    Tiny = 0x01,
    /// SMALLINT.
    Short = 0x02,
    /// INT.
    Long = 0x03,
    /// FLOAT.
    Float = 0x04,
    /// DOUBLE.
    Double = 0x05,
    /// NULL type.
    Null = 0x06,
    /// TIMESTAMP.
    Timestamp = 0x07,
    /// BIGINT.
    LongLong = 0x08,
    /// MEDIUMINT.
    Int24 = 0x09,
    /// DATE.
    Date = 0x0A,
    /// TIME.
    Time = 0x0B,
    /// DATETIME.
    Datetime = 0x0C,
    /// YEAR.
    Year = 0x0D,
    /// Internal new date.
    NewDate = 0x0E,
    /// VARCHAR.
    Varchar = 0x0F,
    /// BIT.
    Bit = 0x10,
    /// JSON.
    Json = 0xF5,
    /// DECIMAL.
    NewDecimal = 0xF6,
    /// ENUM.
    Enum = 0xF7,
    /// SET.
    Set = 0xF8,
    /// TINYBLOB/TINYTEXT.
    TinyBlob = 0xF9,
    /// MEDIUMBLOB/MEDIUMTEXT.
    MediumBlob = 0xFA,
    /// LONGBLOB/LONGTEXT.
    LongBlob = 0xFB,
    /// BLOB/TEXT.
    Blob = 0xFC,
    /// VARCHAR/VARBINARY (the default parameter type).
    VarString = 0xFD,
    /// CHAR/BINARY.
    String = 0xFE,
    /// Spatial type.
    Geometry = 0xFF,
}

impl ColumnType {
    /// Map a raw wire type code to a known column type.
    ///
    /// Returns `None` for codes this driver has no name for; callers keep
    /// the raw code around for those.
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::Decimal,
            0x01 => Self::Tiny,
            0x02 => Self::Short,
            0x03 => Self::Long,
            0x04 => Self::Float,
            0x05 => Self::Double,
            0x06 => Self::Null,
            0x07 => Self::Timestamp,
            0x08 => Self::LongLong,
            0x09 => Self::Int24,
            0x0A => Self::Date,
            0x0B => Self::Time,
            0x0C => Self::Datetime,
            0x0D => Self::Year,
            0x0E => Self::NewDate,
            0x0F => Self::Varchar,
            0x10 => Self::Bit,
            0xF5 => Self::Json,
            0xF6 => Self::NewDecimal,
            0xF7 => Self::Enum,
            0xF8 => Self::Set,
            0xF9 => Self::TinyBlob,
            0xFA => Self::MediumBlob,
            0xFB => Self::LongBlob,
            0xFC => Self::Blob,
            0xFD => Self::VarString,
            0xFE => Self::String,
            0xFF => Self::Geometry,
            _ => return None,
        })
    }
}

bitflags! {
    /// Column definition flag bits.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u16 {
        /// Column is NOT NULL.
        const NOT_NULL       = 0x0001;
        /// Column is part of the primary key.
        const PRI_KEY        = 0x0002;
        /// Column is part of a unique key.
        const UNIQUE_KEY     = 0x0004;
        /// Column is part of a non-unique key.
        const MULTIPLE_KEY   = 0x0008;
        /// Column holds BLOB/TEXT data.
        const BLOB           = 0x0010;
        /// Column is unsigned.
        const UNSIGNED       = 0x0020;
        /// Column is ZEROFILL.
        const ZEROFILL       = 0x0040;
        /// Column uses a binary collation.
        const BINARY         = 0x0080;
        /// Column is an ENUM.
        const ENUM           = 0x0100;
        /// Column auto-increments.
        const AUTO_INCREMENT = 0x0200;
        /// Column is a TIMESTAMP.
        const TIMESTAMP      = 0x0400;
        /// Column is a SET.
        const SET            = 0x0800;
        /// Column is numeric.
        const NUM            = 0x8000;
    }
}
