//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use std::{fs, io::BufRead, path::Path};

use tracing::debug;

use crate::{
    errors::{CalcEngineError, Result},
    model::Network,
};

/// Reads a network description; JSON when the document opens with `{`, YAML otherwise.
pub fn load_network_from_file(path: impl AsRef<Path>) -> Result<Network> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading network description");
    let data = fs::read_to_string(path)?;
    let network = if data.trim_start().starts_with('{') {
        serde_json::from_str(&data)?
    } else {
        serde_yaml::from_str(&data).map_err(CalcEngineError::YamlSerializationFailed)?
    };
    Ok(network)
}

/// One non-blank line of a JSON-lines batch, parsed independently of its neighbours.
#[derive(Debug)]
pub struct NetworkLine {
    /// 1-based line number in the source file.
    pub line: usize,
    pub network: Result<Network>,
}

/// Reads one network per line, skipping blank lines. A malformed line fails the whole read.
pub fn load_networks_from_jsonl(path: impl AsRef<Path>) -> Result<Vec<Network>> {
    read_network_lines(path)?
        .into_iter()
        .map(|entry| entry.network)
        .collect()
}

/// Like [`load_networks_from_jsonl`], but keeps the parse outcome of every line.
/// Only failures to read the file itself are returned as `Err`.
pub fn read_network_lines(path: impl AsRef<Path>) -> Result<Vec<NetworkLine>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading network batch");
    let reader = std::io::BufReader::new(fs::File::open(path)?);
    let mut entries = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(NetworkLine {
            line: number + 1,
            network: serde_json::from_str(&line).map_err(CalcEngineError::from),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("net.json");
        fs::write(
            &json_path,
            r#"{"population": 3, "queues": [{"load": 2.0}, {"load": 3.0}]}"#,
        )
        .unwrap();
        let network = load_network_from_file(&json_path).unwrap();
        assert_eq!(network.loads(), vec![2.0, 3.0]);

        let yaml_path = dir.path().join("net.yaml");
        fs::write(&yaml_path, "population: 1\nqueues:\n  - load: 0.5\n").unwrap();
        let network = load_network_from_file(&yaml_path).unwrap();
        assert_eq!(network.population(), 1);
    }

    #[test]
    fn invalid_document_surfaces_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"population": -2, "queues": [{"load": 1.0}]}"#).unwrap();
        let err = load_network_from_file(&path).unwrap_err();
        assert!(matches!(err, CalcEngineError::SerializationFailed(_)));
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn jsonl_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.jsonl");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"population": 2, "queues": [{{"load": 1.0}}]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"population": 0, "queues": []}}"#).unwrap();
        drop(file);

        let networks = load_networks_from_jsonl(&path).unwrap();
        assert_eq!(networks.len(), 2);
        assert_eq!(networks[1].population(), 0);
    }

    #[test]
    fn bad_lines_are_reported_individually() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.jsonl");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"population": 2, "queues": [{{"load": 1.0}}]}}"#).unwrap();
        writeln!(file, r#"{{"population": 2, "queues": [{{"load": -1.0}}]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"population": 1, "queues": [{{"load": 3.0}}]}}"#).unwrap();
        drop(file);

        let entries = read_network_lines(&path).unwrap();
        let lines: Vec<usize> = entries.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 4, 5]);
        assert!(entries[0].network.is_ok());
        assert!(entries[1].network.is_err());
        assert!(entries[2].network.is_err());
        assert_eq!(entries[3].network.as_ref().unwrap().population(), 1);

        assert!(load_networks_from_jsonl(&path).is_err());
    }
}
