use crate::error::Result;
use k8s_openapi::api::core::v1::Node;
use kube::api::{ListParams, ObjectList};
use kube::{Api, Client};

/// List the names of every node in the cluster
///
/// # Errors
///
/// Will return `Err` if data can not be retrieved from k8s cluster api
pub async fn list_names(client: Client) -> Result<Vec<String>> {
    let nodes: Api<Node> = Api::all(client);
    let node_list: ObjectList<Node> = nodes.list(&ListParams::default()).await?;

    Ok(node_list
        .items
        .into_iter()
        .filter_map(|node| node.metadata.name)
        .collect())
}
