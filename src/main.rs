use gumdrop::Options;
use hostload::config::LoadTestConfiguration;
use hostload::LoadTest;

#[tokio::main]
async fn main() {
    let configuration = LoadTestConfiguration::parse_args_default_or_exit();
    configuration.initialize_logger();

    // Configuration errors are reported before any request is made.
    let load_test = match LoadTest::initialize_with_config(configuration) {
        Ok(load_test) => load_test,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match load_test.execute().await {
        Ok(report) => println!("{}", report.markdown),
        Err(e) => {
            log::error!("load test failed: {}", e);
            std::process::exit(1);
        }
    }
}
