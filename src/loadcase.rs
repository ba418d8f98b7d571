use crate::network::Network;
use anyhow::{format_err, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reads a network snapshot from a JSON file.
pub fn load_network(path: &Path) -> Result<Network> {
    let file = File::open(path)
        .map_err(|err| format_err!("network '{}' not readable: {}", path.display(), err))?;
    let network: Network = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format_err!("network '{}' is malformed: {}", path.display(), err))?;
    log::debug!(
        "network '{}': {} buses, {} branches",
        path.display(),
        network.buses.len(),
        network.branches.len()
    );
    Ok(network)
}
