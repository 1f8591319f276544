use gumdrop::Options;
use httpmock::MockServer;
use std::io::{self, BufRead};

use hostload::config::LoadTestConfiguration;

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// The following options are configured by default, if not set to a custom value:
///  --target <mock-server>/
///  --requests 10
///  --concurrency 2
///  --seed 1
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> LoadTestConfiguration {
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.url("/");
    build_configuration_for_target(&server_url, custom)
}

/// Same defaults as `build_configuration`, but against an arbitrary target.
#[allow(dead_code)]
pub fn build_configuration_for_target(target: &str, custom: Vec<&str>) -> LoadTestConfiguration {
    let mut configuration: Vec<&str> = vec![];

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    if !configuration.contains(&"--target") {
        configuration.extend_from_slice(&["--target", target]);
    }
    if !configuration.contains(&"--requests") {
        configuration.extend_from_slice(&["--requests", "10"]);
    }
    if !configuration.contains(&"--concurrency") {
        configuration.extend_from_slice(&["--concurrency", "2"]);
    }
    if !configuration.contains(&"--seed") {
        configuration.extend_from_slice(&["--seed", "1"]);
    }

    // Parse these options to generate a LoadTestConfiguration.
    LoadTestConfiguration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Helper to count the number of lines in a test artifact.
#[allow(dead_code)]
pub fn file_length(file_name: &str) -> usize {
    if let Ok(file) = std::fs::File::open(std::path::Path::new(file_name)) {
        io::BufReader::new(file).lines().count()
    } else {
        0
    }
}

/// Helper to delete test artifacts, if existing.
#[allow(dead_code)]
pub fn cleanup_files(files: Vec<&str>) {
    for file in files {
        if std::path::Path::new(file).exists() {
            std::fs::remove_file(file).expect("failed to remove file");
        }
    }
}
