//! Working-memory snapshots in `MessagePack`.
//!
//! A [`Snapshot`] holds the templates, facts and global values of an
//! environment. Rules, functions and deffacts are code owned by the host and
//! are not captured; restoring a snapshot into an environment that already
//! defines its rules re-derives the agenda from the restored facts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rulebook_engine::Environment;
use rulebook_foundation::{Error, ErrorKind, FactId, Missing, Result, Value};
use rulebook_storage::{Fact, Template};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Templates, facts and globals of an environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,
    /// Templates, by name.
    pub templates: Vec<Template>,
    /// Facts, in assertion order.
    pub facts: Vec<Fact>,
    /// Global names and current values.
    pub globals: Vec<(String, Value)>,
}

impl Snapshot {
    /// Captures the state of an environment.
    #[must_use]
    pub fn capture(env: &Environment) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            templates: env.templates().map(|t| (**t).clone()).collect(),
            facts: env.facts().map(|f| (**f).clone()).collect(),
            globals: env
                .globals()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }

    /// Replaces the working memory of an environment with this snapshot.
    ///
    /// Existing facts are retracted, templates defined, and the snapshot's
    /// facts asserted in order through the pattern network, so rules already
    /// defined in `env` activate on them. Facts receive new ids. Returns the
    /// new ids in snapshot order.
    ///
    /// # Errors
    /// Returns a constraint error if the snapshot version is unsupported, a
    /// template conflicts with a rule using it, or a fact does not fit its
    /// template. Nothing in `env` changes on error.
    pub fn restore(&self, env: &mut Environment) -> Result<Vec<FactId>> {
        self.check(env).map_err(|e| e.in_operation("restore"))?;

        let existing: Vec<FactId> = env.facts().map(|f| f.id).collect();
        for id in existing {
            env.retract(id).map_err(|e| e.in_operation("restore"))?;
        }
        for template in &self.templates {
            env.define_template(template.clone())
                .map_err(|e| e.in_operation("restore"))?;
        }

        let mut ids = Vec::with_capacity(self.facts.len());
        for fact in &self.facts {
            let id = env
                .assert_fact(fact.template.as_deref(), fact.values.clone())
                .map_err(|e| e.in_operation("restore"))?;
            ids.push(id);
        }

        for (name, value) in &self.globals {
            if env.set_global(name, value.clone()).is_err() {
                env.define_global(name, value.clone());
            }
        }

        info!(
            templates = self.templates.len(),
            facts = ids.len(),
            "snapshot restored"
        );
        Ok(ids)
    }

    fn check(&self, env: &Environment) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::constraint(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }

        let mut templates: BTreeMap<&str, &Template> = env
            .templates()
            .map(|t| (t.name.as_ref(), t.as_ref()))
            .collect();
        for template in &self.templates {
            env.check_template(template)?;
            templates.insert(template.name.as_ref(), template);
        }

        for fact in &self.facts {
            match &fact.template {
                Some(name) => templates
                    .get(&**name)
                    .ok_or_else(|| Error::not_found(Missing::Template(name.to_string())))?
                    .check_values(&fact.values)?,
                None if fact.values.is_empty() => {
                    return Err(Error::constraint("ordered fact has no values"));
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// Serializes a snapshot to bytes using `MessagePack` format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(snapshot)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

/// Deserializes a snapshot from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn from_bytes(bytes: &[u8]) -> Result<Snapshot> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

fn io_error(action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::new(ErrorKind::IoError(format!(
        "failed to {action} file '{}': {e}",
        path.display()
    )))
}

/// Saves the state of an environment to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to,
/// or if serialization fails.
pub fn save_to_file<P: AsRef<Path>>(env: &Environment, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(&Snapshot::capture(env))?;
    let file = File::create(path).map_err(|e| io_error("create", path, &e))?;

    let mut writer = BufWriter::new(file);
    writer
        .write_all(&bytes)
        .map_err(|e| io_error("write to", path, &e))?;
    writer.flush().map_err(|e| io_error("flush", path, &e))?;
    Ok(())
}

/// Reads a snapshot from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or if deserialization fails.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_error("open", path, &e))?;

    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| io_error("read", path, &e))?;

    from_bytes(&bytes)
}

/// Loads a snapshot file into an environment, replacing its working memory.
///
/// # Errors
///
/// Returns an error if the file cannot be read, cannot be decoded, or does
/// not fit the environment's templates.
pub fn load_from_file<P: AsRef<Path>>(env: &mut Environment, path: P) -> Result<Vec<FactId>> {
    read_file(path)?.restore(env)
}
