use anyhow::Result;
use wacore_binary::builder::NodeBuilder;
use wacore_binary::jid::Jid;
use wacore_binary::node::NodeContent;
use whatsapp_rust::Client;

/// Participant roles that grant admin rights
const ADMIN_ROLES: [&str; 2] = ["admin", "superadmin"];

/// Group queries over `w:g2` IQs
#[allow(async_fn_in_trait)]
pub trait GroupQueries {
    /// User parts of every admin and super admin of the group
    async fn group_admins(&self, group_jid: &Jid) -> Result<Vec<String>>;

    /// Remove participants; returns `(jid, removed)` per participant
    async fn remove_group_participants(
        &self,
        group_jid: &Jid,
        participant_jids: &[Jid],
    ) -> Result<Vec<(Jid, bool)>>;
}

impl GroupQueries for Client {
    async fn group_admins(&self, group_jid: &Jid) -> Result<Vec<String>> {
        let query_node = NodeBuilder::new("query")
            .attr("request", "interactive")
            .build();

        let iq = whatsapp_rust::request::InfoQuery {
            namespace: "w:g2",
            query_type: whatsapp_rust::request::InfoQueryType::Get,
            to: group_jid.clone(),
            content: Some(NodeContent::Nodes(vec![query_node])),
            id: None,
            target: None,
            timeout: None,
        };

        let resp_node = self.send_iq(iq).await?;
        let group_node = resp_node
            .get_optional_child("group")
            .ok_or_else(|| anyhow::anyhow!("<group> not found in group info response"))?;

        let mut admins = Vec::new();
        for participant in group_node.get_children_by_tag("participant") {
            let mut parser = wacore_binary::attrs::AttrParser::new(participant);
            let is_admin = parser
                .optional_string("type")
                .is_some_and(|role| ADMIN_ROLES.contains(&role));
            if is_admin {
                admins.push(parser.jid("jid").user);
            }
        }
        Ok(admins)
    }

    async fn remove_group_participants(
        &self,
        group_jid: &Jid,
        participant_jids: &[Jid],
    ) -> Result<Vec<(Jid, bool)>> {
        if participant_jids.is_empty() {
            return Ok(vec![]);
        }

        let participant_nodes: Vec<_> = participant_jids
            .iter()
            .map(|jid| {
                NodeBuilder::new("participant")
                    .attr("jid", jid.to_string())
                    .build()
            })
            .collect();
        let remove_node = NodeBuilder::new("remove")
            .children(participant_nodes)
            .build();

        let iq = whatsapp_rust::request::InfoQuery {
            namespace: "w:g2",
            query_type: whatsapp_rust::request::InfoQueryType::Set,
            to: group_jid.clone(),
            content: Some(NodeContent::Nodes(vec![remove_node])),
            id: None,
            target: None,
            timeout: None,
        };

        let resp_node = self.send_iq(iq).await?;

        let mut results = Vec::new();
        if let Some(remove_response) = resp_node.get_optional_child("remove") {
            for participant_node in remove_response.get_children_by_tag("participant") {
                let mut parser = wacore_binary::attrs::AttrParser::new(participant_node);
                let jid = parser.jid("jid");
                match parser.optional_u64("error") {
                    Some(code) => {
                        tracing::warn!(participant = %jid, code, "Failed to remove participant");
                        results.push((jid, false));
                    }
                    None => results.push((jid, true)),
                }
            }
        }
        Ok(results)
    }
}
