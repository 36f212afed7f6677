use camino::Utf8Path;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params, params_from_iter};

use crate::error::ArchiveError;
use crate::index::{ChunkRecord, IndexTables, PathComponentTable};

const CREATE_IND: &str = "CREATE TABLE ind (
    Path TEXT NOT NULL,
    FileName TEXT NOT NULL,
    Starttime REAL NOT NULL,
    Endtime REAL NOT NULL,
    Gaps REAL NOT NULL,
    Nc INTEGER NOT NULL,
    Nt INTEGER NOT NULL,
    Duration REAL NOT NULL,
    Station TEXT NOT NULL
);
CREATE INDEX ind_station_time ON ind (Station, Starttime);";

const SELECT_IND: &str =
    "SELECT Path, FileName, Starttime, Endtime, Gaps, Nc, Nt, Duration, Station FROM ind";

pub struct IndexDb {
    conn: Connection,
}

struct RawRecord {
    path: String,
    file_name: String,
    starttime: f64,
    endtime: f64,
    gaps: f64,
    nc: i64,
    nt: i64,
    duration: f64,
    station: String,
}

impl IndexDb {
    pub fn open(path: &Utf8Path) -> Result<Self, ArchiveError> {
        let conn = Connection::open_with_flags(path.as_std_path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|err| ArchiveError::IndexDb(format!("open {path}: {err}")))?;
        Ok(Self { conn })
    }

    pub fn write(path: &Utf8Path, tables: &IndexTables) -> Result<(), ArchiveError> {
        let parent = path
            .parent()
            .ok_or_else(|| ArchiveError::Filesystem(format!("invalid index path {path}")))?;
        let temp = tempfile::Builder::new()
            .prefix(".index-")
            .suffix(".db.tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;

        {
            let mut conn = Connection::open(temp.path())
                .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
            let tx = conn
                .transaction()
                .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
            tx.execute_batch(CREATE_IND)
                .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
            write_records(&tx, &tables.records)?;
            write_components(&tx, &tables.components)?;
            tx.commit()
                .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
        }

        temp.persist(path.as_std_path())
            .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn load_range(
        &self,
        station: &str,
        t1: f64,
        t2: f64,
    ) -> Result<Vec<ChunkRecord>, ArchiveError> {
        let sql = format!(
            "{SELECT_IND} WHERE Starttime >= ?1 AND Endtime <= ?2 AND Station = ?3 ORDER BY FileName"
        );
        self.load(&sql, params![t1, t2, station])
    }

    pub fn load_all(&self, station: Option<&str>) -> Result<Vec<ChunkRecord>, ArchiveError> {
        match station {
            Some(station) => self.load(
                &format!("{SELECT_IND} WHERE Station = ?1 ORDER BY FileName"),
                params![station],
            ),
            None => self.load(&format!("{SELECT_IND} ORDER BY FileName"), params![]),
        }
    }

    pub fn load_components(&self) -> Result<PathComponentTable, ArchiveError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM indkey ORDER BY Depth")
            .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
        let columns = stmt
            .column_names()
            .iter()
            .enumerate()
            .filter_map(|(position, name)| {
                name.strip_prefix("col_")
                    .and_then(|idx| idx.parse::<usize>().ok())
                    .map(|idx| (position, idx))
            })
            .collect::<Vec<_>>();
        let width = columns.iter().map(|(_, idx)| idx + 1).max().unwrap_or(0);

        let rows = stmt
            .query_map([], |row| {
                let mut level = vec![String::new(); width];
                for (position, idx) in &columns {
                    let cell: Option<String> = row.get(*position)?;
                    level[*idx] = cell.unwrap_or_default();
                }
                while level.last().is_some_and(String::is_empty) {
                    level.pop();
                }
                Ok(level)
            })
            .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
        let levels = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
        Ok(PathComponentTable::from_levels(levels))
    }

    pub fn load_tables(&self) -> Result<IndexTables, ArchiveError> {
        Ok(IndexTables {
            records: self.load_all(None)?,
            components: self.load_components()?,
        })
    }

    fn load(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ChunkRecord>, ArchiveError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(RawRecord {
                    path: row.get(0)?,
                    file_name: row.get(1)?,
                    starttime: row.get(2)?,
                    endtime: row.get(3)?,
                    gaps: row.get(4)?,
                    nc: row.get(5)?,
                    nt: row.get(6)?,
                    duration: row.get(7)?,
                    station: row.get(8)?,
                })
            })
            .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;

        rows.map(|row| {
            let raw = row.map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
            let path: Vec<usize> = serde_json::from_str(&raw.path).map_err(|err| {
                ArchiveError::IndexDb(format!("bad Path value {}: {err}", raw.path))
            })?;
            Ok(ChunkRecord {
                path,
                file_name: raw.file_name,
                starttime: raw.starttime,
                endtime: raw.endtime,
                gaps: raw.gaps,
                channel_count: raw.nc.max(0) as usize,
                trace_count: raw.nt.max(0) as usize,
                duration: raw.duration,
                station: raw.station,
            })
        })
        .collect()
    }
}

fn write_records(conn: &Connection, records: &[ChunkRecord]) -> Result<(), ArchiveError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO ind (Path, FileName, Starttime, Endtime, Gaps, Nc, Nt, Duration, Station)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
    for record in records {
        let path = serde_json::to_string(&record.path)
            .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
        stmt.execute(params![
            path,
            record.file_name,
            record.starttime,
            record.endtime,
            record.gaps,
            record.channel_count as i64,
            record.trace_count as i64,
            record.duration,
            record.station,
        ])
        .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
    }
    Ok(())
}

// SQLITE_MAX_COLUMN of the bundled build, less the Depth column.
const MAX_SEGMENTS_PER_DEPTH: usize = 2000 - 1;

// `indkey`: row `d` holds the segments of depth `d`, column `col_c` the
// segment at position `c`; short rows are padded with empty strings.
fn write_components(conn: &Connection, table: &PathComponentTable) -> Result<(), ArchiveError> {
    if let Some((depth, level)) = table
        .levels()
        .iter()
        .enumerate()
        .find(|(_, level)| level.len() > MAX_SEGMENTS_PER_DEPTH)
    {
        return Err(ArchiveError::TooManyPathSegments {
            depth,
            segments: level.len(),
            limit: MAX_SEGMENTS_PER_DEPTH,
        });
    }
    let width = table.levels().iter().map(Vec::len).max().unwrap_or(0);
    let mut create = String::from("CREATE TABLE indkey (Depth INTEGER PRIMARY KEY");
    for idx in 0..width {
        create.push_str(&format!(", col_{idx} TEXT NOT NULL DEFAULT ''"));
    }
    create.push(')');
    conn.execute_batch(&create)
        .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;

    let columns = (0..width)
        .map(|idx| format!(", col_{idx}"))
        .collect::<String>();
    let placeholders = (0..=width)
        .map(|idx| format!("?{}", idx + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn
        .prepare(&format!(
            "INSERT INTO indkey (Depth{columns}) VALUES ({placeholders})"
        ))
        .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;

    for (depth, level) in table.levels().iter().enumerate() {
        let mut values = Vec::with_capacity(width + 1);
        values.push(Value::Integer(depth as i64));
        values.extend((0..width).map(|idx| Value::Text(level.get(idx).cloned().unwrap_or_default())));
        stmt.execute(params_from_iter(values.iter()))
            .map_err(|err| ArchiveError::IndexDb(err.to_string()))?;
    }
    Ok(())
}
