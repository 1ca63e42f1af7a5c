//! Group operations

use rusqlite::{params, Connection};

use super::Database;
use crate::error::Result;
use crate::models::{Group, GroupType};

pub(super) fn insert_group(conn: &Connection, group: &Group, position: usize) -> Result<()> {
    conn.execute(
        r#"INSERT INTO "groups" (id, name, group_type, position) VALUES (?, ?, ?, ?)"#,
        params![group.id, group.name, group.group_type.as_str(), position as i64],
    )?;
    Ok(())
}

impl Database {
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(r#"SELECT id, name, group_type FROM "groups" ORDER BY position"#)?;
        let groups = stmt
            .query_map([], |row| {
                let group_type: String = row.get(2)?;
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    group_type: GroupType::parse_lenient(&group_type),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }
}
