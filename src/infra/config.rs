// ============================================================
// Layer 6 — Configuration Loader
// ============================================================
// Reads the run's YAML document into any serde type.
//
// Example document (config/classifier_cifar10.yaml):
//
//   device: "0,1"
//   batch_size: 128
//   num_workers: 4
//   epoch: 5
//   lr: 0.01
//   weight_decay: 0.0001
//   save_dir: ./result
//
// `device` may be written three ways; all end up as Vec<usize>:
//
//   device: [0, 1]      list
//   device: "0,1"       comma separated, as in CUDA_VISIBLE_DEVICES
//   device: 0           a single index
//
// Reference: serde docs (untagged enums, deserialize_with)

use anyhow::{anyhow, bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use std::{fs, path::Path};

/// Parse a YAML file into `T`
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    if !path.is_file() {
        bail!("Config file '{}' not found", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid config '{}'", path.display()))
}

/// Parse "0,1" / "0, 1" / "" into device indices
pub fn parse_device_list(raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| anyhow!("'{}' is not a device index", s))
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeviceSpec {
    List(Vec<usize>),
    Single(usize),
    Csv(String),
}

/// serde `deserialize_with` hook for the `device` key
pub fn deserialize_devices<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<DeviceSpec>::deserialize(deserializer)? {
        None                         => Ok(Vec::new()),
        Some(DeviceSpec::List(v))    => Ok(v),
        Some(DeviceSpec::Single(i))  => Ok(vec![i]),
        Some(DeviceSpec::Csv(s))     => parse_device_list(&s).map_err(serde::de::Error::custom),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Devices {
        #[serde(default, deserialize_with = "deserialize_devices")]
        device: Vec<usize>,
    }

    fn devices(yaml: &str) -> Vec<usize> {
        serde_yaml::from_str::<Devices>(yaml).unwrap().device
    }

    #[test]
    fn test_device_forms() {
        assert_eq!(devices("device: [0, 1]"), vec![0, 1]);
        assert_eq!(devices("device: \"2,3\""), vec![2, 3]);
        assert_eq!(devices("device: 1,2"), vec![1, 2]);
        assert_eq!(devices("device: 3"), vec![3]);
        assert_eq!(devices("device: \"\""), Vec::<usize>::new());
        assert_eq!(devices("device: ~"), Vec::<usize>::new());
        assert_eq!(devices("{}"), Vec::<usize>::new());
    }

    #[test]
    fn test_bad_device_is_an_error() {
        assert!(serde_yaml::from_str::<Devices>("device: \"0,gpu\"").is_err());
        assert!(parse_device_list("1, x").is_err());
        assert_eq!(parse_device_list(" 0 , 1 ,").unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_yaml::<Devices>("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("cifar_ddp_cfg_{}.yaml", std::process::id()));
        fs::write(&path, "device: [1]\n").unwrap();

        let loaded: Devices = load_yaml(&path).unwrap();
        assert_eq!(loaded.device, vec![1]);

        let _ = fs::remove_file(&path);
    }
}
