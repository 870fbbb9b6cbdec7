use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::data::{CollectionId, ExifData, PhotoId};
use super::metadata::{PhotoPatch, TagList};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{CollectionRecord, NewPhotoRecord, PhotoRecord};

const SCHEMA_VERSION: i32 = 2;

/// Capture dates are stored as naive local time, the way cameras record them
const CAPTURE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const PHOTO_COLUMNS: &str = "p.id, p.path, p.filename, p.file_size, p.width, p.height, \
     p.capture_date, p.added_at, p.rating, p.is_favorite, p.tags, p.description, \
     p.thumbnail_path, p.camera_model, p.lens_model, p.iso, p.aperture, \
     p.shutter_speed, p.focal_length";

/// The Library manages the SQLite catalog database.
/// It stores photo records, collections and collection membership.
///
/// This is the only place the tag list is turned into text and back.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open (or create) the catalog at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> GatewayResult<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        tracing::info!("📁 Database initialized at: {}", db_path.display());

        let library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Throwaway catalog, used by tests
    pub fn open_in_memory() -> GatewayResult<Self> {
        let library = Library {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> GatewayResult<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Key/value table for version tracking
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS app_metadata (
                key     TEXT PRIMARY KEY,
                value   TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "INSERT OR REPLACE INTO app_metadata (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;

        // Create photos table
        // Tags are a JSON array of strings
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS photos (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                path            TEXT NOT NULL UNIQUE,
                filename        TEXT NOT NULL,
                file_size       INTEGER NOT NULL,
                width           INTEGER NOT NULL,
                height          INTEGER NOT NULL,
                capture_date    TEXT,
                added_at        TEXT NOT NULL,
                rating          INTEGER,
                is_favorite     INTEGER NOT NULL DEFAULT 0,
                tags            TEXT NOT NULL DEFAULT '[]',
                description     TEXT,
                thumbnail_path  TEXT
            )",
            [],
        )?;

        // Schema v2: EXIF columns. The ALTER fails harmlessly when the column
        // already exists.
        for column in [
            "camera_model TEXT",
            "lens_model TEXT",
            "iso INTEGER",
            "aperture REAL",
            "shutter_speed TEXT",
            "focal_length REAL",
        ] {
            let _ = self
                .conn
                .execute(&format!("ALTER TABLE photos ADD COLUMN {}", column), []);
        }

        // Create indexes for fast queries
        for index in [
            "CREATE INDEX IF NOT EXISTS idx_photos_rating ON photos(rating)",
            "CREATE INDEX IF NOT EXISTS idx_photos_capture_date ON photos(capture_date)",
            "CREATE INDEX IF NOT EXISTS idx_photos_added_at ON photos(added_at)",
            "CREATE INDEX IF NOT EXISTS idx_photos_is_favorite ON photos(is_favorite)",
        ] {
            self.conn.execute(index, [])?;
        }

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS collections (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            )",
            [],
        )?;

        // Membership: one row per (collection, photo) pair
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS photo_collections (
                photo_id        INTEGER NOT NULL,
                collection_id   INTEGER NOT NULL,
                PRIMARY KEY (photo_id, collection_id),
                FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
                FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
            )",
            [],
        )?;

        tracing::debug!("✅ Database schema initialized (v{})", SCHEMA_VERSION);

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn schema_version(&self) -> GatewayResult<Option<i32>> {
        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM app_metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Get a count of photos in the library
    pub fn photo_count(&self) -> GatewayResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a new photo and return its id
    pub fn insert_photo(&self, photo: &NewPhotoRecord) -> GatewayResult<PhotoId> {
        let tags = photo.tags.to_json()?;
        let capture_date = photo
            .exif
            .capture_date
            .map(|date| date.format(CAPTURE_DATE_FORMAT).to_string());

        self.conn.execute(
            "INSERT INTO photos (path, filename, file_size, width, height, capture_date, added_at,
                                 rating, is_favorite, tags, description, thumbnail_path,
                                 camera_model, lens_model, iso, aperture, shutter_speed, focal_length)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                photo.path,
                photo.filename,
                photo.file_size as i64,
                photo.width,
                photo.height,
                capture_date,
                photo.added_at.to_rfc3339(),
                photo.rating,
                photo.favorite,
                tags,
                photo.description,
                photo.thumbnail_path,
                photo.exif.camera_model,
                photo.exif.lens_model,
                photo.exif.iso,
                photo.exif.aperture,
                photo.exif.shutter_speed,
                photo.exif.focal_length,
            ],
        )?;

        Ok(PhotoId(self.conn.last_insert_rowid()))
    }

    /// Get all photos from the library, in the order they were inserted
    pub fn get_all_photos(&self) -> GatewayResult<Vec<PhotoRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM photos p ORDER BY p.id ASC",
            PHOTO_COLUMNS
        ))?;

        let photos = stmt
            .query_map([], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(photos)
    }

    /// Write the fields a patch carries. Fails if the photo is unknown.
    pub fn update_metadata(&self, photo_id: PhotoId, patch: &PhotoPatch) -> GatewayResult<()> {
        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(tags) = &patch.tags {
            updates.push("tags = ?");
            values.push(Box::new(tags.to_json()?));
        }
        if let Some(rating) = patch.rating {
            updates.push("rating = ?");
            values.push(Box::new(rating));
        }
        if let Some(description) = &patch.description {
            updates.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(favorite) = patch.favorite {
            updates.push("is_favorite = ?");
            values.push(Box::new(favorite));
        }

        if updates.is_empty() {
            return Ok(());
        }

        values.push(Box::new(photo_id.0));
        let query = format!("UPDATE photos SET {} WHERE id = ?", updates.join(", "));

        let value_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let changed = self.conn.execute(&query, value_refs.as_slice())?;
        if changed == 0 {
            return Err(GatewayError::Rejected(format!("photo {} does not exist", photo_id)));
        }
        Ok(())
    }

    pub fn create_collection(&self, name: &str) -> GatewayResult<CollectionRecord> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO collections (name, created_at) VALUES (?1, ?2)",
            params![name, created_at.to_rfc3339()],
        )?;

        Ok(CollectionRecord {
            id: CollectionId(self.conn.last_insert_rowid()),
            name: name.to_string(),
            created_at,
        })
    }

    pub fn get_all_collections(&self) -> GatewayResult<Vec<CollectionRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM collections ORDER BY id ASC")?;

        let collections = stmt
            .query_map([], |row| {
                Ok(CollectionRecord {
                    id: CollectionId(row.get(0)?),
                    name: row.get(1)?,
                    created_at: parse_timestamp(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(collections)
    }

    /// Delete a collection; its membership rows go with it
    pub fn delete_collection(&self, collection_id: CollectionId) -> GatewayResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM collections WHERE id = ?1",
            params![collection_id.0],
        )?;
        if changed == 0 {
            return Err(GatewayError::Rejected(format!(
                "collection {} does not exist",
                collection_id
            )));
        }
        Ok(())
    }

    /// Adding an existing member is not an error
    pub fn add_photo_to_collection(
        &self,
        photo_id: PhotoId,
        collection_id: CollectionId,
    ) -> GatewayResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO photo_collections (photo_id, collection_id) VALUES (?1, ?2)",
            params![photo_id.0, collection_id.0],
        )?;
        Ok(())
    }

    pub fn remove_photo_from_collection(
        &self,
        photo_id: PhotoId,
        collection_id: CollectionId,
    ) -> GatewayResult<()> {
        self.conn.execute(
            "DELETE FROM photo_collections WHERE photo_id = ?1 AND collection_id = ?2",
            params![photo_id.0, collection_id.0],
        )?;
        Ok(())
    }

    pub fn get_photos_in_collection(
        &self,
        collection_id: CollectionId,
    ) -> GatewayResult<Vec<PhotoRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM photos p
             INNER JOIN photo_collections pc ON p.id = pc.photo_id
             WHERE pc.collection_id = ?1
             ORDER BY p.id ASC",
            PHOTO_COLUMNS
        ))?;

        let photos = stmt
            .query_map(params![collection_id.0], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(photos)
    }

    /// Pretty-printed JSON dump of the whole catalog
    pub fn export_json(&self) -> GatewayResult<String> {
        #[derive(Serialize)]
        struct Membership {
            photo_id: i64,
            collection_id: i64,
        }

        #[derive(Serialize)]
        struct Backup {
            schema_version: Option<i32>,
            photos: Vec<PhotoRecord>,
            collections: Vec<CollectionRecord>,
            photo_collections: Vec<Membership>,
        }

        let mut stmt = self
            .conn
            .prepare("SELECT photo_id, collection_id FROM photo_collections ORDER BY collection_id, photo_id")?;
        let photo_collections = stmt
            .query_map([], |row| {
                Ok(Membership {
                    photo_id: row.get(0)?,
                    collection_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let backup = Backup {
            schema_version: self.schema_version()?,
            photos: self.get_all_photos()?,
            collections: self.get_all_collections()?,
            photo_collections,
        };

        Ok(serde_json::to_string_pretty(&backup)?)
    }
}

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn parse_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoRecord> {
    let capture_date = row
        .get::<_, Option<String>>(6)?
        .map(|text| NaiveDateTime::parse_from_str(&text, CAPTURE_DATE_FORMAT))
        .transpose()
        .map_err(|e| conversion_error(6, e))?;

    let tags: String = row.get(10)?;
    let tags = TagList::from_json(&tags).map_err(|e| conversion_error(10, e))?;

    Ok(PhotoRecord {
        id: PhotoId(row.get(0)?),
        path: row.get(1)?,
        filename: row.get(2)?,
        file_size: row.get::<_, i64>(3)?.max(0) as u64,
        width: row.get(4)?,
        height: row.get(5)?,
        exif: ExifData {
            capture_date,
            camera_model: row.get(13)?,
            lens_model: row.get(14)?,
            iso: row.get(15)?,
            aperture: row.get(16)?,
            shutter_speed: row.get(17)?,
            focal_length: row.get(18)?,
        },
        added_at: parse_timestamp(row, 7)?,
        rating: row.get(8)?,
        favorite: row.get(9)?,
        tags,
        description: row.get(11)?,
        thumbnail_path: row.get(12)?,
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_photo(path: &str) -> NewPhotoRecord {
        NewPhotoRecord {
            path: path.to_string(),
            filename: Path::new(path)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string(),
            file_size: 4096,
            width: 3000,
            height: 2000,
            exif: ExifData::default(),
            added_at: Utc::now(),
            rating: None,
            favorite: false,
            tags: TagList::new(),
            description: None,
            thumbnail_path: Some("/cache/abc.jpg".into()),
        }
    }

    #[test]
    fn test_photo_round_trip() {
        let library = Library::open_in_memory().unwrap();

        let mut photo = new_photo("/photos/sunset.jpg");
        photo.tags = ["sunset", "beach"].into_iter().collect();
        photo.exif.capture_date = NaiveDate::from_ymd_opt(2023, 7, 14)
            .and_then(|d| d.and_hms_opt(19, 30, 5));
        photo.exif.camera_model = Some("X-T4".into());
        photo.exif.aperture = Some(2.8);

        let id = library.insert_photo(&photo).unwrap();
        let all = library.get_all_photos().unwrap();

        assert_eq!(all, vec![photo.with_id(id)]);
        assert_eq!(all[0].tags.as_slice(), &["sunset", "beach"]);
        assert_eq!(all[0].rating, None);
    }

    #[test]
    fn test_duplicate_path_is_rejected() {
        let library = Library::open_in_memory().unwrap();
        library.insert_photo(&new_photo("/photos/a.jpg")).unwrap();

        let err = library.insert_photo(&new_photo("/photos/a.jpg")).unwrap_err();
        assert!(matches!(err, GatewayError::Database(_)));
        assert_eq!(library.photo_count().unwrap(), 1);
    }

    #[test]
    fn test_update_metadata_writes_only_patched_fields() {
        let library = Library::open_in_memory().unwrap();
        let mut photo = new_photo("/photos/a.jpg");
        photo.description = Some("keep me".into());
        let id = library.insert_photo(&photo).unwrap();

        let patch = PhotoPatch {
            rating: Some(Some(4)),
            tags: Some(["dog"].into_iter().collect()),
            ..PhotoPatch::default()
        };
        library.update_metadata(id, &patch).unwrap();

        let stored = &library.get_all_photos().unwrap()[0];
        assert_eq!(stored.rating, Some(4));
        assert!(stored.tags.contains("dog"));
        assert_eq!(stored.description.as_deref(), Some("keep me"));

        let missing = library.update_metadata(PhotoId(99), &patch);
        assert!(matches!(missing, Err(GatewayError::Rejected(_))));
    }

    #[test]
    fn test_collection_membership() {
        let library = Library::open_in_memory().unwrap();
        let a = library.insert_photo(&new_photo("/photos/a.jpg")).unwrap();
        let b = library.insert_photo(&new_photo("/photos/b.jpg")).unwrap();
        let trips = library.create_collection("Trips").unwrap();

        library.add_photo_to_collection(b, trips.id).unwrap();
        library.add_photo_to_collection(a, trips.id).unwrap();
        library.add_photo_to_collection(a, trips.id).unwrap();

        let members: Vec<PhotoId> = library
            .get_photos_in_collection(trips.id)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(members, vec![a, b]);

        library.remove_photo_from_collection(a, trips.id).unwrap();
        assert_eq!(library.get_photos_in_collection(trips.id).unwrap().len(), 1);

        library.delete_collection(trips.id).unwrap();
        assert!(library.get_all_collections().unwrap().is_empty());
        assert!(library.delete_collection(trips.id).is_err());
    }

    #[test]
    fn test_export_json_contains_everything() {
        let library = Library::open_in_memory().unwrap();
        let a = library.insert_photo(&new_photo("/photos/a.jpg")).unwrap();
        let c = library.create_collection("Best").unwrap();
        library.add_photo_to_collection(a, c.id).unwrap();

        let json = library.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["schema_version"], 2);
        assert_eq!(value["photos"].as_array().unwrap().len(), 1);
        assert_eq!(value["collections"][0]["name"], "Best");
        assert_eq!(value["photo_collections"][0]["photo_id"], a.0);
    }
}
