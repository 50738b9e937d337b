//! Persistent knowledge index: chunk text, metadata and embedding vectors in
//! one SQLite file, searched by brute-force cosine similarity.
//!
//! A build writes a complete new generation to a temporary file in the index
//! directory and renames it over the live file only after the self-test
//! queries pass. Appends run in a single transaction under WAL, so a reader
//! always sees one consistent generation.

use crate::document::{Document, Metadata};
use crate::error::{CoreError, Result};
use crate::providers::Embedder;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub const INDEX_FILE: &str = "index.sqlite3";
pub const SELF_TEST_QUERIES: &[&str] = &["What is OPT?", "How to apply for OPT?"];
pub const SELF_TEST_K: usize = 2;

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

pub struct KnowledgeIndex {
    conn: Mutex<Connection>,
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
}

pub fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

pub fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON { 0.0 } else { dot / denom }
}

fn open_connection(path: &Path, wal: bool) -> Result<Connection> {
    let conn = Connection::open(path)?;
    let journal = if wal { "WAL" } else { "DELETE" };
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = {journal};
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        "
    ))?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL,       -- JSON Metadata
            embedding BLOB NOT NULL,      -- little-endian f32
            added_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS index_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn insert_chunks(conn: &mut Connection, chunks: &[Document], vectors: &[Vec<f32>]) -> Result<()> {
    let added_at = chrono::Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("INSERT INTO chunks (content, metadata, embedding, added_at) VALUES (?1, ?2, ?3, ?4)")?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            stmt.execute(params![
                chunk.content,
                serde_json::to_string(&chunk.metadata)?,
                serialize_embedding(vector),
                added_at
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn set_info(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO index_info (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn get_info(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM index_info WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?)
}

fn search_connection(conn: &Connection, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
    let mut stmt = conn.prepare("SELECT content, metadata, embedding FROM chunks ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Vec<u8>>(2)?,
        ))
    })?;

    let mut scored = Vec::new();
    for row in rows {
        let (content, metadata, blob) = row?;
        let stored = deserialize_embedding(&blob);
        if stored.len() != query.len() {
            debug!("Skipping chunk with {} dimensions (query has {})", stored.len(), query.len());
            continue;
        }
        let metadata: Metadata = serde_json::from_str(&metadata)?;
        scored.push(ScoredDocument {
            score: cosine_similarity(query, &stored),
            document: Document::new(content, metadata),
        });
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
}

fn remove_if_exists(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_file(path)
    {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl KnowledgeIndex {
    pub fn exists(dir: &Path) -> bool {
        index_path(dir).exists()
    }

    /// Open the persisted index in `dir`.
    pub fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = index_path(dir);
        if !path.exists() {
            return Err(CoreError::Config(format!("knowledge index not found at {}", path.display())));
        }
        let conn = open_connection(&path, true)?;
        info!("Loaded knowledge index from {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            embedder,
        })
    }

    /// Embed `chunks`, write them as a fresh generation, self-test it and
    /// only then replace whatever index `dir` held before.
    pub async fn build(dir: &Path, chunks: &[Document], embedder: Arc<dyn Embedder>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(CoreError::EmptyCorpus);
        }
        fs::create_dir_all(dir)?;

        info!("Embedding {} chunks", chunks.len());
        let contents: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = embedder.embed(&contents).await?;
        if vectors.len() != chunks.len() {
            return Err(CoreError::Provider(format!(
                "got {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let generation = uuid::Uuid::new_v4().to_string();
        let tmp_path = dir.join(format!("{}.{}.tmp", INDEX_FILE, generation));
        let outcome = Self::write_generation(&tmp_path, &generation, chunks, &vectors, embedder.as_ref()).await;
        if let Err(e) = outcome {
            remove_if_exists(&tmp_path);
            return Err(e);
        }

        let path = index_path(dir);
        remove_if_exists(&sidecar(&path, "-wal"));
        remove_if_exists(&sidecar(&path, "-shm"));
        fs::rename(&tmp_path, &path)?;
        info!("Knowledge index generation {} saved to {}", generation, path.display());

        Self::open(dir, embedder)
    }

    async fn write_generation(
        tmp_path: &Path,
        generation: &str,
        chunks: &[Document],
        vectors: &[Vec<f32>],
        embedder: &dyn Embedder,
    ) -> Result<()> {
        {
            let mut conn = open_connection(tmp_path, false)?;
            insert_chunks(&mut conn, chunks, vectors)?;
            set_info(&conn, "generation", generation)?;
            set_info(&conn, "created_at", &chrono::Utc::now().to_rfc3339())?;
            set_info(&conn, "dimensions", &vectors.first().map(Vec::len).unwrap_or(0).to_string())?;
        }

        for query in SELF_TEST_QUERIES {
            let query_vector = embedder.embed_query(query).await?;
            let conn = open_connection(tmp_path, false)?;
            if search_connection(&conn, &query_vector, SELF_TEST_K)?.is_empty() {
                return Err(CoreError::IndexValidation(format!(
                    "vector store validation failed for: {}",
                    query
                )));
            }
        }
        Ok(())
    }

    /// Add `chunks` to the index persisted in `dir`. Failures are logged and
    /// reported as `false`; the index is left as it was.
    pub async fn append(dir: &Path, chunks: &[Document], embedder: Arc<dyn Embedder>) -> bool {
        let result = async {
            let index = Self::open(dir, embedder)?;
            index.add_documents(chunks).await
        }
        .await;
        match result {
            Ok(added) => {
                info!("Appended {} chunks to {}", added, index_path(dir).display());
                true
            }
            Err(e) => {
                error!("Error appending to knowledge index: {}", e);
                false
            }
        }
    }

    pub async fn add_documents(&self, chunks: &[Document]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let contents: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self.embedder.embed(&contents).await?;
        if vectors.len() != chunks.len() {
            return Err(CoreError::Provider(format!(
                "got {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let mut conn = self.lock()?;
        if let Some(dimensions) = get_info(&conn, "dimensions")?
            && let Some(first) = vectors.first()
            && dimensions != first.len().to_string()
        {
            return Err(CoreError::IndexValidation(format!(
                "embedding dimensions {} do not match index dimensions {}",
                first.len(),
                dimensions
            )));
        }
        insert_chunks(&mut conn, chunks, &vectors)?;
        Ok(chunks.len())
    }

    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self
            .similarity_search_with_scores(query, k)
            .await?
            .into_iter()
            .map(|scored| scored.document)
            .collect())
    }

    pub async fn similarity_search_with_scores(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let query_vector = self.embedder.embed_query(query).await?;
        let conn = self.lock()?;
        search_connection(&conn, &query_vector, k)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn generation(&self) -> Result<Option<String>> {
        get_info(&*self.lock()?, "generation")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::IndexValidation("index connection lock poisoned".to_string()))
    }
}
