use osh_collector::config::ResolvedConfig;
use osh_collector::domain::{EndpointType, ProjectId};
use osh_collector::osf::OsfHttpClient;
use osh_collector::resolver::resolve_endpoint;

#[test]
#[ignore]
fn resolve_real_osf_project() {
    let config = ResolvedConfig::default();
    let client = OsfHttpClient::new(&config).unwrap();
    let id: ProjectId = "https://osf.io/ezcuj".parse().unwrap();
    let resolution = resolve_endpoint(&client, &config.base_url, &id).unwrap();

    assert_eq!(resolution.endpoint_type, EndpointType::Node);
}
