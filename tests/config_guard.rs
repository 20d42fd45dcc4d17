use oxidity_sandwich::app::config::network_profile;
use regex::Regex;
use std::fs;
use std::path::Path;

const CONFIG_FILES: [&str; 4] = [
    "config.toml",
    "config.example.toml",
    "config.goerli.toml",
    "config.mainnet.toml",
];

/// Fail CI if config files contain 64-hex private keys.
#[test]
fn no_committed_hex_keys_in_configs() {
    let re = Regex::new(r"0x?[a-fA-F0-9]{64}").unwrap();
    for file in CONFIG_FILES {
        if !Path::new(file).exists() {
            continue;
        }
        let body = fs::read_to_string(file).expect("read config");
        for (idx, line) in body.lines().enumerate() {
            let key = line.split('=').next().unwrap_or_default().trim();
            // The pair init code hash is public and 32 bytes long.
            if key == "pair_init_code_hash" {
                continue;
            }
            if re.is_match(line) {
                panic!("Secret-looking hex in {} at line {}", file, idx + 1);
            }
        }
    }
}

#[test]
fn example_config_names_a_known_network() {
    let file = "config.example.toml";
    if !Path::new(file).exists() {
        return;
    }
    let body = fs::read_to_string(file).expect("read config");
    let re = Regex::new(r#"(?m)^\s*network\s*=\s*"([a-z]+)""#).unwrap();
    let caps = re.captures(&body).expect("network key present");
    assert!(network_profile(&caps[1]).is_ok(), "unknown network {}", &caps[1]);
}
