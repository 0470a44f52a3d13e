use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, params, params_from_iter};
use serde::Serialize;
use trellis_kernel::DepKind;

use crate::error::Result;
use crate::filter::Filter;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    command TEXT NOT NULL,
    preamble TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    node_id TEXT,
    node_name TEXT
);

CREATE TABLE IF NOT EXISTS deps (
    parent TEXT NOT NULL,
    child TEXT NOT NULL,
    dep_kind TEXT NOT NULL,
    FOREIGN KEY (parent) REFERENCES jobs(id) ON DELETE CASCADE ON UPDATE CASCADE,
    FOREIGN KEY (child) REFERENCES jobs(id) ON DELETE CASCADE ON UPDATE CASCADE,
    UNIQUE (parent, child, dep_kind)
);

CREATE VIEW IF NOT EXISTS vw_jobs AS
    SELECT
        j.*,
        j.rowid AS seq,
        (SELECT GROUP_CONCAT(d.child, ',') FROM deps d WHERE d.parent = j.id) AS children,
        (SELECT GROUP_CONCAT(d2.parent, ',') FROM deps d2 WHERE d2.child = j.id) AS parents
    FROM jobs j;
";

/// Insert shape for a freshly submitted job. Timestamps are stamped by the
/// store at write time.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub command: String,
    pub preamble: String,
    pub node_id: String,
    pub node_name: String,
}

/// A row of the joined view, with the aggregate columns split back into
/// lists.
#[derive(Debug, Clone, Serialize)]
pub struct StoredJob {
    pub id: String,
    pub command: String,
    pub preamble: String,
    pub created_at: String,
    pub updated_at: String,
    pub node_id: String,
    pub node_name: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub command: Option<String>,
    pub preamble: Option<String>,
    pub node_id: Option<String>,
    pub node_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub parent: String,
    pub child: String,
    pub dep_kind: String,
}

/// SQLite-backed job + dependency store. One connection per operation; the
/// single-writer assumption lives with the caller.
#[derive(Debug, Clone)]
pub struct JobStore {
    db_path: PathBuf,
}

impl JobStore {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let store = JobStore { db_path };
        let conn = store.connect()?;
        conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    pub fn create_job(&self, rec: &JobRecord) -> Result<()> {
        self.create_job_with_edges(rec, &[], DepKind::Afterok)
    }

    /// The submission boundary's write: one job row plus one edge per parent,
    /// atomically. A crash between the scheduler call and this write leaves
    /// an orphan scheduler job, never a half-recorded one.
    pub fn create_job_with_edges(
        &self,
        rec: &JobRecord,
        parents: &[String],
        dep_kind: DepKind,
    ) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let now = now_timestamp();
        tx.execute(
            "INSERT INTO jobs (id, command, preamble, created_at, updated_at, node_id, node_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rec.id,
                rec.command,
                rec.preamble,
                now,
                now,
                rec.node_id,
                rec.node_name
            ],
        )?;
        for parent in parents {
            tx.execute(
                "INSERT OR IGNORE INTO deps (parent, child, dep_kind) VALUES (?1, ?2, ?3)",
                params![parent, rec.id, dep_kind.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn update_job(&self, id: &str, update: &JobUpdate) -> Result<()> {
        let mut sets = Vec::new();
        let mut values: Vec<String> = Vec::new();
        for (column, value) in [
            ("command", &update.command),
            ("preamble", &update.preamble),
            ("node_id", &update.node_id),
            ("node_name", &update.node_name),
        ] {
            if let Some(value) = value {
                sets.push(format!("{column} = ?"));
                values.push(value.clone());
            }
        }
        if sets.is_empty() {
            return Ok(());
        }
        sets.push("updated_at = ?".to_string());
        values.push(now_timestamp());
        values.push(id.to_string());

        let sql = format!("UPDATE jobs SET {} WHERE id = ?", sets.join(", "));
        let conn = self.connect()?;
        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    /// Deletes a job row. With `cascade`, every transitive child goes too;
    /// either way the FK cascade clears the edges touching the row.
    pub fn delete_job(&self, id: &str, cascade: bool) -> Result<()> {
        let children = if cascade {
            self.children_of(id)?
        } else {
            Vec::new()
        };
        let conn = self.connect()?;
        conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        drop(conn);
        for child in children {
            self.delete_job(&child, true)?;
        }
        Ok(())
    }

    pub fn delete_by_node(&self, node_ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for node_id in node_ids {
            let ids = {
                let conn = self.connect()?;
                let mut stmt = conn.prepare("SELECT id FROM jobs WHERE node_id = ?1")?;
                let rows = stmt.query_map(params![node_id], |row| row.get::<_, String>(0))?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            };
            for id in ids {
                self.delete_job(&id, false)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Replaces every edge incoming to `child_id` with the given parent set.
    pub fn upsert_edges(&self, child_id: &str, parent_ids: &[String], dep_kind: DepKind) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM deps WHERE child = ?1", params![child_id])?;
        for parent in parent_ids {
            tx.execute(
                "INSERT OR IGNORE INTO deps (parent, child, dep_kind) VALUES (?1, ?2, ?3)",
                params![parent, child_id, dep_kind.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Points every outgoing edge of `old_parent` at `new_parent`, keeping
    /// each edge's `dep_kind`. Edges that would collide with an existing
    /// `(new_parent, child, dep_kind)` row are left behind for the old row's
    /// cascade to sweep up.
    pub fn rewire_parent(&self, old_parent: &str, new_parent: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE OR IGNORE deps SET parent = ?1 WHERE parent = ?2",
            params![new_parent, old_parent],
        )?;
        Ok(())
    }

    pub fn get_job(&self, id: &str) -> Result<Option<StoredJob>> {
        let filter = Filter {
            field: "id".to_string(),
            op: crate::filter::FilterOp::Eq,
            value: id.to_string(),
        };
        Ok(self.select_jobs(&[filter])?.into_iter().next())
    }

    /// Raw filtered select over the joined view, submission order.
    pub fn select_jobs(&self, filters: &[Filter]) -> Result<Vec<StoredJob>> {
        let mut sql = String::from(
            "SELECT id, command, preamble, created_at, updated_at, node_id, node_name, \
             parents, children FROM vw_jobs",
        );
        let mut values = Vec::new();
        if !filters.is_empty() {
            let clauses: Vec<String> = filters.iter().map(Filter::sql_clause).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
            values.extend(filters.iter().map(Filter::sql_param));
        }
        sql.push_str(" ORDER BY created_at ASC, seq ASC");

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(StoredJob {
                id: row.get(0)?,
                command: row.get(1)?,
                preamble: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
                node_id: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                node_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                parents: split_ids(row.get::<_, Option<String>>(7)?),
                children: split_ids(row.get::<_, Option<String>>(8)?),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn parents_of(&self, id: &str) -> Result<Vec<String>> {
        self.edge_endpoints("SELECT parent FROM deps WHERE child = ?1 ORDER BY rowid", id)
    }

    pub fn children_of(&self, id: &str) -> Result<Vec<String>> {
        self.edge_endpoints("SELECT child FROM deps WHERE parent = ?1 ORDER BY rowid", id)
    }

    fn edge_endpoints(&self, sql: &str, id: &str) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn edges(&self) -> Result<Vec<Edge>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT parent, child, dep_kind FROM deps ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(Edge {
                parent: row.get(0)?,
                child: row.get(1)?,
                dep_kind: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn count_jobs(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn split_ids(joined: Option<String>) -> Vec<String> {
    match joined {
        Some(text) if !text.is_empty() => text.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Microsecond-resolution UTC text so lexicographic order is submission
/// order even within one second.
fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
