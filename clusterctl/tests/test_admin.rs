mod common;
use common::*;

use ::common::error::ClusterError;
use clusterctl::core::admin::{AdminClient, HealApi, TopologySource, load_topology};
use clusterctl::core::topology::SetId;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_storage_info_is_signed_and_parsed() -> anyhow::Result<()> {
    init_tracing();
    let mock = MockCluster::start(MockState::new(storage_info(
        vec![disk(0, 0, "n1", 1, "ok"), disk(0, 0, "n2", 1, "corrupt")],
        4,
    )))
    .await?;

    let client = AdminClient::new(&cluster_args(&mock.url).config())?;
    let topo = load_topology(&client).await?;

    let set = &topo.sets[&SetId::new(0, 0)];
    assert_eq!(set.bad_disks, 1);
    assert!(set.can_reboot);
    assert_eq!(topo.total_servers(), 2);

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_request_surfaces_status() -> anyhow::Result<()> {
    init_tracing();
    let mock = MockCluster::start(MockState::new(storage_info(vec![disk(0, 0, "n1", 1, "ok")], 2))).await?;

    let mut args = cluster_args(&mock.url);
    args.key = "intruder".to_string();
    let client = AdminClient::new(&args.config())?;

    let err = client.storage_info().await.unwrap_err();
    let status = err
        .chain()
        .find_map(|e| e.downcast_ref::<ClusterError>())
        .and_then(|e| match e {
            ClusterError::AdminStatus { status, .. } => Some(*status),
            _ => None,
        });
    assert_eq!(status, Some(403));

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heal_start_then_status_with_token() -> anyhow::Result<()> {
    init_tracing();
    let state = MockState::new(storage_info(vec![disk(0, 0, "n1", 1, "ok")], 2));
    state.script(0, 0, &[3]);
    let mock = MockCluster::start(state).await?;

    let client = AdminClient::new(&cluster_args(&mock.url).config())?;
    let id = SetId::new(0, 0);
    let token = client.heal_start(id).await?;
    assert_eq!(token, "tok-0-0");

    let first = client.heal_status(id, &token).await?;
    assert_eq!(first.summary, "running");
    assert_eq!(first.items[0].invalid_after(), 3);

    let second = client.heal_status(id, &token).await?;
    assert_eq!(second.summary, "finished");
    assert_eq!(second.items[0].invalid_after(), 0);

    assert!(client.heal_status(id, "forged").await.is_err());

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signature_must_cover_the_sent_request() -> anyhow::Result<()> {
    use clusterctl::core::sigv4::{Credentials, Signer};
    use time::OffsetDateTime;
    use url::Url;

    init_tracing();
    let mock = MockCluster::start(MockState::new(storage_info(vec![disk(0, 0, "n1", 1, "ok")], 2))).await?;
    let signer = Signer::new(
        Credentials { access_key: ACCESS_KEY.into(), secret_key: SECRET_KEY.into() },
        "us-east-1",
        "s3",
    );
    let http = reqwest::Client::new();
    let target = Url::parse(&format!("{}/minio/admin/v3/storageinfo", mock.url))?;

    let send = |signed_for: Url| {
        let signed = signer.sign("GET", &signed_for, b"", OffsetDateTime::now_utc());
        http.get(target.clone())
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .header("authorization", signed.authorization)
            .send()
    };

    assert_eq!(send(target.clone()).await?.status(), 200);

    let mut other_query = target.clone();
    other_query.set_query(Some("pool=1"));
    assert_eq!(send(other_query).await?.status(), 403);

    let other_path = Url::parse(&format!("{}/minio/admin/v3/info", mock.url))?;
    assert_eq!(send(other_path).await?.status(), 403);

    mock.shutdown().await?;
    Ok(())
}
