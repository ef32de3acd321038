use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{AnytypeApi, UpdateMemberRequest};
use crate::config::MAX_PAGE_LIMIT;
use crate::errors::{AppError, AppResult};
use crate::icons::DisplayIcon;
use crate::models::{Member, MemberRole, MemberStatus};
use crate::pagination::{PageRequest, Pagination};

pub const TOOL_NAMES: [&str; 6] = [
    "approve-member",
    "decline-member",
    "reject-member",
    "remove-member",
    "update-member",
    "get-members",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInput {
    pub space_id: String,
    pub member_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveMemberInput {
    pub space_id: String,
    pub member_id: String,
    #[serde(default = "default_approved_role")]
    pub role: MemberRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberInput {
    pub space_id: String,
    pub member_id: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMembersInput {
    pub space_id: String,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: Option<u32>,
}

fn default_approved_role() -> MemberRole {
    MemberRole::Viewer
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberOutput {
    pub id: String,
    pub name: String,
    pub icon: DisplayIcon,
    pub identity: String,
    pub global_name: String,
    pub status: MemberStatus,
    pub role: MemberRole,
}

impl From<Member> for MemberOutput {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            name: member.name,
            icon: member.icon,
            identity: member.identity,
            global_name: member.global_name,
            status: member.status,
            role: member.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersOutput {
    pub members: Vec<MemberOutput>,
    pub pagination: Pagination,
}

async fn set_member(
    api: &AnytypeApi,
    space_id: &str,
    member_id: &str,
    request: UpdateMemberRequest,
) -> AppResult<MemberOutput> {
    let member = api.update_member(space_id, member_id, &request).await?;
    info!(
        target: "tools",
        space_id,
        member_id,
        status = ?member.status,
        role = ?member.role,
        "member updated"
    );
    Ok(member.into())
}

/// Admits a pending member with the requested role.
pub async fn approve_member(api: &AnytypeApi, input: ApproveMemberInput) -> AppResult<MemberOutput> {
    set_member(
        api,
        &input.space_id,
        &input.member_id,
        UpdateMemberRequest {
            status: Some(MemberStatus::Active),
            role: Some(input.role),
        },
    )
    .await
}

pub async fn decline_member(api: &AnytypeApi, input: MemberInput) -> AppResult<MemberOutput> {
    set_member(
        api,
        &input.space_id,
        &input.member_id,
        UpdateMemberRequest {
            status: Some(MemberStatus::Declined),
            role: None,
        },
    )
    .await
}

/// Declines a join request, refusing members that are not waiting to join.
pub async fn reject_member(api: &AnytypeApi, input: MemberInput) -> AppResult<MemberOutput> {
    let member = api.get_member(&input.space_id, &input.member_id).await?;
    if member.status != MemberStatus::Joining {
        return Err(AppError::InvalidInput(format!(
            "member {} has no pending join request",
            input.member_id
        )));
    }
    decline_member(api, input).await
}

pub async fn remove_member(api: &AnytypeApi, input: MemberInput) -> AppResult<MemberOutput> {
    set_member(
        api,
        &input.space_id,
        &input.member_id,
        UpdateMemberRequest {
            status: Some(MemberStatus::Removed),
            role: None,
        },
    )
    .await
}

pub async fn update_member(api: &AnytypeApi, input: UpdateMemberInput) -> AppResult<MemberOutput> {
    set_member(
        api,
        &input.space_id,
        &input.member_id,
        UpdateMemberRequest {
            status: None,
            role: Some(input.role),
        },
    )
    .await
}

/// Lists one page of members; `default_limit` applies when the input names
/// no limit.
pub async fn get_members(
    api: &AnytypeApi,
    input: GetMembersInput,
    default_limit: u32,
) -> AppResult<MembersOutput> {
    let page = PageRequest {
        offset: input.offset,
        limit: input.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
    };
    let members = api.get_members(&input.space_id, page).await?;
    Ok(MembersOutput {
        members: members.items.into_iter().map(MemberOutput::from).collect(),
        pagination: members.pagination,
    })
}

fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> AppResult<T> {
    serde_json::from_value(input)
        .map_err(|err| AppError::InvalidInput(format!("{tool}: {err}")))
}

/// Dispatches a tool call by its kebab-case name. `page_limit` is the
/// configured default page size for list tools.
pub async fn run_tool(
    api: &AnytypeApi,
    name: &str,
    input: Value,
    page_limit: u32,
) -> AppResult<Value> {
    debug!(target: "tools", tool = name, "running tool");
    let output = match name {
        "approve-member" => {
            serde_json::to_value(approve_member(api, parse_input(name, input)?).await?)?
        }
        "decline-member" => {
            serde_json::to_value(decline_member(api, parse_input(name, input)?).await?)?
        }
        "reject-member" => {
            serde_json::to_value(reject_member(api, parse_input(name, input)?).await?)?
        }
        "remove-member" => {
            serde_json::to_value(remove_member(api, parse_input(name, input)?).await?)?
        }
        "update-member" => {
            serde_json::to_value(update_member(api, parse_input(name, input)?).await?)?
        }
        "get-members" => {
            serde_json::to_value(get_members(api, parse_input(name, input)?, page_limit).await?)?
        }
        other => {
            return Err(AppError::InvalidInput(format!(
                "unknown tool {other}; expected one of {}",
                TOOL_NAMES.join(", ")
            )))
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::AnytypeClient;
    use crate::config::AppConfig;
    use crate::icons::IconResolver;

    fn offline_api() -> AnytypeApi {
        let config = AppConfig {
            api_url: "http://127.0.0.1:1".into(),
            ..AppConfig::default()
        };
        AnytypeApi::new(AnytypeClient::new(&config).unwrap(), IconResolver::offline())
    }

    #[test]
    fn approve_defaults_to_viewer() {
        let input: ApproveMemberInput =
            serde_json::from_value(json!({"spaceId": "s", "memberId": "m"})).unwrap();
        assert_eq!(input.role, MemberRole::Viewer);

        let input: ApproveMemberInput =
            serde_json::from_value(json!({"spaceId": "s", "memberId": "m", "role": "editor"}))
                .unwrap();
        assert_eq!(input.role, MemberRole::Editor);
    }

    #[tokio::test]
    async fn rejects_unknown_tools_and_bad_input() {
        let api = offline_api();
        let err = run_tool(&api, "delete-space", json!({}), 50).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("approve-member"));

        let err = run_tool(&api, "remove-member", json!({"spaceId": "s"}), 50)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("memberId"));
    }

    #[test]
    fn output_uses_camel_case() {
        let output = MemberOutput {
            id: "m".into(),
            name: "Ann".into(),
            icon: DisplayIcon::fallback_for(crate::models::ObjectLayout::Participant),
            identity: "id".into(),
            global_name: "ann.any".into(),
            status: MemberStatus::Active,
            role: MemberRole::Owner,
        };
        let value = serde_json::to_value(output).unwrap();
        assert_eq!(value["globalName"], "ann.any");
        assert_eq!(value["status"], "active");
        assert_eq!(value["role"], "owner");
    }
}
