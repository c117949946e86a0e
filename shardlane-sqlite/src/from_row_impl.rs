use rusqlite::types::FromSql;
use rusqlite::Row;

use crate::db::FromRow;

fn next(cursor: &mut usize) -> usize {
    let current = *cursor;
    *cursor = current + 1;
    current
}

macro_rules! tuple_from_row {
    ($($field:ident)*) => {
        impl<$($field: FromSql,)*> FromRow for ($($field,)*) {
            fn from_row(row: &Row) -> rusqlite::Result<Self> {
                let mut cursor = 0;
                Ok((
                    $(
                        {
                            let _name = stringify!($field);
                            row.get(next(&mut cursor))?
                        },
                    )*
                ))
            }
        }
    };
}

macro_rules! common_tuples_from_row {
    () => {};
    ($first:ident $($rest:ident)*) => {
        tuple_from_row!($first $($rest)*);
        common_tuples_from_row!($($rest)*);
    };
}

common_tuples_from_row!(T1 T2 T3 T4 T5 T6 T7 T8 T9 T10 T11 T12 T13 T14 T15 T16);
