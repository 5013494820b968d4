//! Labels kept on disk.
//!
//! Keys go to one of four column families by pattern shape; values are
//! encoded label lists. Writes are collected by the transaction and written
//! in one engine transaction at commit.

pub mod engine;
pub mod registry;

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

pub use engine::{ColumnFamily, Engine, EngineBatch};
pub use registry::StoreRegistry;

use crate::{
    context::BoundedCache,
    error::{AbacError, Result},
    labels::{
        BatchOp,
        Label,
        LabelsStore,
        Node,
        PatternShape,
        SupportsCompaction,
        Transactional,
        Triple,
        WriteBatch,
        pattern::resolve,
    },
    storefmt::{
        BufferPool,
        ByteReader,
        DEFAULT_BUFFER_CAPACITY,
        EncodeMode,
        MemNodeTable,
        NodeTable,
        ScratchBuf,
        StoreFmt,
        StoreFormat,
    },
};

pub const DEFAULT_LOOKUP_CACHE_SIZE: usize = 10_000;

const META_FORMAT: &str = "format";
const META_PATTERNS: &str = "patterns_loaded";

/// The one key of the `_ _ _` column family.
const ANY_KEY: [u8; 1] = [0x0a];

/// How a write treats a value already stored under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    /// Last write wins.
    #[default]
    Overwrite,
    /// Labels accumulate; duplicates are dropped when read.
    Merge,
}

impl fmt::Display for LabelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LabelMode::Overwrite => "overwrite",
            LabelMode::Merge => "merge",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
    pub format: StoreFormat,
    pub mode: LabelMode,
    /// Largest encoded key or label list.
    pub buffer_capacity: usize,
    /// Zero disables the lookup cache.
    pub lookup_cache_size: usize,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            format: StoreFormat::default(),
            mode: LabelMode::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            lookup_cache_size: DEFAULT_LOOKUP_CACHE_SIZE,
        }
    }
}

/// Persistent labels store backed by SQLite. Append-only: entries can be
/// overwritten or merged but not removed.
pub struct LabelsStoreSqlite {
    dir: PathBuf,
    options: SqliteOptions,
    format: Box<dyn StoreFmt>,
    nodes: Option<Arc<MemNodeTable>>,
    /// `None` once closed.
    engine: RwLock<Option<Engine>>,
    buffers: BufferPool,
    patterns_loaded: AtomicBool,
    cache: Mutex<BoundedCache<Triple, Vec<Label>>>,
    /// Bumped on every commit; lookups started under an older value do not
    /// populate the cache.
    generation: AtomicU64,
    txn: Transactional,
}

impl LabelsStoreSqlite {
    pub fn open(dir: impl AsRef<Path>, options: SqliteOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let engine = Engine::open(&dir)?;

        let format_name = options.format.to_string();
        match engine.meta(META_FORMAT)? {
            Some(recorded) if recorded != format_name => {
                return Err(AbacError::validation(format!(
                    "store at {} was created with format {recorded}, not {format_name}",
                    dir.display()
                )));
            }
            Some(_) => {}
            None => engine.set_meta(META_FORMAT, &format_name)?,
        }

        let nodes = match options.format {
            StoreFormat::ByNodeId => {
                let table = MemNodeTable::new();
                let saved = engine
                    .load_nodes()?
                    .into_iter()
                    .map(|(id, term)| Ok((id, Node::from_term(&term)?)))
                    .collect::<Result<Vec<_>>>()?;
                table.load(saved)?;
                Some(Arc::new(table))
            }
            _ => None,
        };
        let format = options
            .format
            .build(nodes.clone().map(|table| table as Arc<dyn NodeTable>))?;
        let patterns_loaded = engine.meta(META_PATTERNS)?.as_deref() == Some("true");

        log::info!(
            "opened labels store {} ({}, {})",
            dir.display(),
            format.name(),
            options.mode
        );
        Ok(Self {
            dir,
            options,
            format,
            nodes,
            engine: RwLock::new(Some(engine)),
            buffers: BufferPool::new(options.buffer_capacity),
            patterns_loaded: AtomicBool::new(patterns_loaded),
            cache: Mutex::new(BoundedCache::new(options.lookup_cache_size)),
            generation: AtomicU64::new(0),
            txn: Transactional::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    pub fn mode(&self) -> LabelMode {
        self.options.mode
    }

    /// Close the underlying database. Later calls fail with
    /// [`AbacError::Closed`]. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        let closed = self.engine.write().take().is_some();
        if closed {
            log::info!("closed labels store {}", self.dir.display());
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.engine.read().is_none()
    }

    /// Hits and misses of the lookup cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        let cache = self.cache.lock();
        (cache.hits(), cache.misses())
    }

    fn with_engine<T>(&self, f: impl FnOnce(&Engine) -> Result<T>) -> Result<T> {
        let guard = self.engine.read();
        let engine = guard.as_ref().ok_or(AbacError::Closed)?;
        f(engine)
    }

    fn encode_key(
        &self,
        buf: &mut ScratchBuf,
        shape: PatternShape,
        pattern: &Triple,
        mode: EncodeMode,
    ) -> Result<bool> {
        let encoder = self.format.encoder();
        match shape {
            PatternShape::Spo | PatternShape::SpAny => encoder.encode_triple(buf, pattern, mode),
            PatternShape::SAnyAny => encoder.encode_node(buf, &pattern.s, mode),
            PatternShape::AnyPAny => encoder.encode_node(buf, &pattern.p, mode),
            PatternShape::AnyAnyAny => {
                buf.put_slice(&ANY_KEY)?;
                Ok(true)
            }
        }
    }

    fn decode_key(&self, cf: ColumnFamily, key: &[u8]) -> Result<Triple> {
        let decoder = self.format.decoder();
        let mut reader = ByteReader::new(key);
        let pattern = match cf {
            ColumnFamily::Spo => decoder.decode_triple(&mut reader)?,
            ColumnFamily::S => {
                Triple::new(decoder.decode_node(&mut reader)?, Node::Any, Node::Any)
            }
            ColumnFamily::P => {
                Triple::new(Node::Any, decoder.decode_node(&mut reader)?, Node::Any)
            }
            ColumnFamily::Any => {
                reader.take(key.len())?;
                Triple::new(Node::Any, Node::Any, Node::Any)
            }
        };
        if !reader.is_empty() {
            return Err(AbacError::decode(format!(
                "{} trailing bytes after key in {}",
                reader.remaining(),
                cf.table()
            )));
        }
        Ok(pattern)
    }

    fn probe(
        &self,
        engine: &Engine,
        shape: PatternShape,
        key: &Triple,
    ) -> Result<Option<Vec<Label>>> {
        let mut buf = self.buffers.acquire();
        if !self.encode_key(&mut buf, shape, key, EncodeMode::Lookup)? {
            return Ok(None);
        }
        match engine.get(ColumnFamily::for_shape(shape), buf.as_slice())? {
            Some(value) => Ok(Some(self.format.decoder().decode_labels(&value)?)),
            None => Ok(None),
        }
    }

    fn write_batch(&self, engine: &Engine, batch: WriteBatch, watermark: u64) -> Result<bool> {
        let mut out = EngineBatch::default();
        let mut wildcards = false;
        for op in batch {
            match op {
                BatchOp::Add { pattern, labels } => {
                    let pattern = pattern.normalized();
                    let shape = PatternShape::of(&pattern)?;
                    wildcards |= shape.is_wildcard();

                    let mut key = self.buffers.acquire();
                    self.encode_key(&mut key, shape, &pattern, EncodeMode::Store)?;
                    let mut value = self.buffers.acquire();
                    self.format.encoder().encode_labels(&mut value, &labels)?;
                    out.puts
                        .push((ColumnFamily::for_shape(shape), key.to_vec(), value.to_vec()));
                }
                BatchOp::Remove(triple) => {
                    return Err(AbacError::unsupported(format!(
                        "remove of {triple} from an append-only store"
                    )));
                }
            }
        }
        if let Some(nodes) = &self.nodes {
            out.nodes = nodes
                .allocated_since(watermark)
                .into_iter()
                .map(|(id, node)| (id, node.to_term()))
                .collect();
        }
        if wildcards && !self.patterns_loaded.load(Ordering::Acquire) {
            out.meta.push((META_PATTERNS.to_string(), "true".to_string()));
        }
        engine.write(out, self.options.mode)?;
        Ok(wildcards)
    }
}

impl LabelsStore for LabelsStoreSqlite {
    fn labels_for_triple(&self, triple: &Triple) -> Result<Vec<Label>> {
        let triple = triple.normalized();
        self.with_engine(|engine| {
            let generation = self.generation.load(Ordering::Acquire);
            if let Some(hit) = self.cache.lock().get(&triple) {
                return Ok(hit);
            }
            let patterns_loaded = self.patterns_loaded.load(Ordering::Acquire);
            let labels = resolve(&triple, patterns_loaded, |shape, key| {
                self.probe(engine, shape, key)
            })?;
            let mut cache = self.cache.lock();
            if self.generation.load(Ordering::Acquire) == generation {
                cache.insert(triple.clone(), labels.clone());
            }
            Ok(labels)
        })
    }

    fn transactional(&self) -> &Transactional {
        &self.txn
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        self.with_engine(|engine| {
            let watermark = self.nodes.as_ref().map_or(0, |nodes| nodes.watermark());
            let wildcards = match self.write_batch(engine, batch, watermark) {
                Ok(wildcards) => wildcards,
                Err(e) => {
                    if let Some(nodes) = &self.nodes {
                        nodes.truncate(watermark);
                    }
                    return Err(e);
                }
            };
            if wildcards {
                self.patterns_loaded.store(true, Ordering::Release);
            }
            let mut cache = self.cache.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            cache.clear();
            Ok(())
        })
    }

    fn for_each(&self, f: &mut dyn FnMut(&Triple, &[Label])) -> Result<()> {
        if !self.format.is_reversible() {
            return Err(AbacError::unsupported(format!(
                "listing entries of a {} store",
                self.format.name()
            )));
        }
        // Rows are read under the engine lock; `f` runs after it is released
        // so it may call back into the store.
        let rows = self.with_engine(|engine| {
            let mut rows = Vec::new();
            for cf in ColumnFamily::ALL {
                rows.extend(engine.scan(cf)?.into_iter().map(|(k, v)| (cf, k, v)));
            }
            Ok(rows)
        })?;
        let decoder = self.format.decoder();
        for (cf, key, value) in rows {
            let pattern = self.decode_key(cf, &key)?;
            let labels = decoder.decode_labels(&value)?;
            f(&pattern, &labels);
        }
        Ok(())
    }

    fn is_empty(&self) -> Result<bool> {
        self.with_engine(|engine| {
            for cf in ColumnFamily::ALL {
                if engine.count(cf)? > 0 {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    fn supports_remove(&self) -> bool {
        false
    }

    fn properties(&self) -> Result<BTreeMap<String, String>> {
        self.with_engine(|engine| {
            let mut props = BTreeMap::new();
            props.insert("kind".to_string(), "persistent".to_string());
            props.insert("path".to_string(), self.dir.display().to_string());
            props.insert("format".to_string(), self.format.name());
            props.insert("mode".to_string(), self.options.mode.to_string());
            props.insert(
                "approximate_size".to_string(),
                engine.approximate_size()?.to_string(),
            );
            for cf in ColumnFamily::ALL {
                props.insert(format!("entries.{}", cf.table()), engine.count(cf)?.to_string());
            }
            props.insert(
                "patterns_loaded".to_string(),
                self.patterns_loaded.load(Ordering::Acquire).to_string(),
            );
            if let Some(nodes) = &self.nodes {
                props.insert("node_ids".to_string(), nodes.len().to_string());
            }
            Ok(props)
        })
    }

    fn as_compaction(&self) -> Option<&dyn SupportsCompaction> {
        Some(self)
    }
}

impl SupportsCompaction for LabelsStoreSqlite {
    fn compact(&self) -> Result<()> {
        self.with_engine(|engine| {
            let before = engine.approximate_size()?;
            engine.compact()?;
            log::info!(
                "compacted labels store {}: {before} -> {} bytes",
                self.dir.display(),
                engine.approximate_size()?
            );
            Ok(())
        })
    }
}

impl Drop for LabelsStoreSqlite {
    fn drop(&mut self) {
        self.close();
    }
}
