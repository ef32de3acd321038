//! Endpoint functions: request, check, decode, map.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{page_query, AnytypeClient};
use crate::errors::AppResult;
use crate::icons::IconResolver;
use crate::mapping::{
    map_member, map_members, map_object, map_objects, map_properties, map_property, map_space,
    map_spaces, map_tag, map_tags, map_type, map_types,
};
use crate::models::{
    ListEnvelope, Member, MemberEnvelope, MemberRole, MemberStatus, ObjectEnvelope, ObjectIcon,
    ObjectLayout, Property, PropertyEnvelope, PropertyWithValue, RawMember, RawProperty, RawSpace,
    RawSpaceObject, RawTag, RawTemplate, RawType, SortDirection, SortPreference, Space,
    SpaceEnvelope, SpaceObject, Tag, TagEnvelope, Template, TemplateEnvelope, Type, TypeEnvelope,
};
use crate::pagination::{PageRequest, Paginated};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSpaceRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSpaceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateObjectRequest {
    pub name: String,
    pub type_key: String,
    pub icon: Option<ObjectIcon>,
    pub body: Option<String>,
    pub template_id: Option<String>,
    pub properties: Vec<PropertyWithValue>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateObjectRequest {
    pub name: Option<String>,
    pub icon: Option<ObjectIcon>,
    pub markdown: Option<String>,
    pub properties: Option<Vec<PropertyWithValue>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePropertyRequest {
    pub name: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePropertyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTagRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypePropertyRequest {
    pub key: String,
    pub name: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTypeRequest {
    pub name: String,
    pub plural_name: String,
    pub layout: ObjectLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<ObjectIcon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub properties: Vec<TypePropertyRequest>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTypeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<ObjectIcon>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateMemberRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MemberStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
}

#[derive(Debug, Clone, Serialize)]
struct SearchSort<'a> {
    property_key: &'a str,
    direction: SortDirection,
}

#[derive(Debug, Clone, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "no_types")]
    types: &'a [String],
    sort: SearchSort<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct ObjectBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a ObjectIcon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChallengeResponse {
    challenge_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiKeyResponse {
    api_key: String,
}

/// Typed access to the local API, returning display entities.
#[derive(Clone)]
pub struct AnytypeApi {
    client: AnytypeClient,
    icons: IconResolver,
}

impl AnytypeApi {
    pub fn new(client: AnytypeClient, icons: IconResolver) -> Self {
        Self { client, icons }
    }

    pub fn client(&self) -> &AnytypeClient {
        &self.client
    }

    pub fn icons(&self) -> &IconResolver {
        &self.icons
    }

    // -- auth ---------------------------------------------------------------

    pub async fn create_challenge(&self, app_name: &str) -> AppResult<String> {
        let response: ChallengeResponse = self
            .client
            .post(
                &["auth", "challenges"],
                &[],
                &serde_json::json!({ "app_name": app_name }),
            )
            .await?;
        Ok(response.challenge_id)
    }

    pub async fn create_api_key(&self, challenge_id: &str, code: &str) -> AppResult<String> {
        let response: ApiKeyResponse = self
            .client
            .post(
                &["auth", "api_keys"],
                &[],
                &serde_json::json!({ "challenge_id": challenge_id, "code": code }),
            )
            .await?;
        Ok(response.api_key)
    }

    // -- spaces -------------------------------------------------------------

    pub async fn get_spaces(&self, page: PageRequest) -> AppResult<Paginated<Space>> {
        let envelope: ListEnvelope<RawSpace> = self.client.get_page(&["spaces"], page).await?;
        Ok(Paginated {
            items: map_spaces(&envelope.data, &self.icons).await?,
            pagination: envelope.pagination,
        })
    }

    pub async fn get_space(&self, space_id: &str) -> AppResult<Space> {
        let envelope: SpaceEnvelope = self.client.get(&["spaces", space_id], &[]).await?;
        map_space(&envelope.space, &self.icons).await
    }

    pub async fn create_space(&self, request: &CreateSpaceRequest) -> AppResult<Space> {
        let envelope: SpaceEnvelope = self.client.post(&["spaces"], &[], request).await?;
        map_space(&envelope.space, &self.icons).await
    }

    pub async fn update_space(
        &self,
        space_id: &str,
        request: &UpdateSpaceRequest,
    ) -> AppResult<Space> {
        let envelope: SpaceEnvelope = self.client.patch(&["spaces", space_id], request).await?;
        map_space(&envelope.space, &self.icons).await
    }

    // -- objects ------------------------------------------------------------

    pub async fn get_objects(
        &self,
        space_id: &str,
        page: PageRequest,
        sort: SortPreference,
    ) -> AppResult<Paginated<SpaceObject>> {
        let envelope: ListEnvelope<RawSpaceObject> = self
            .client
            .get_page(&["spaces", space_id, "objects"], page)
            .await?;
        self.object_page(envelope, sort).await
    }

    /// Searches one space, ordered by the active sort preference.
    pub async fn search_space(
        &self,
        space_id: &str,
        query: &str,
        types: &[String],
        page: PageRequest,
        sort: SortPreference,
    ) -> AppResult<Paginated<SpaceObject>> {
        let body = search_body(query, types, sort);
        let envelope: ListEnvelope<RawSpaceObject> = self
            .client
            .post(&["spaces", space_id, "search"], &page_query(page), &body)
            .await?;
        self.object_page(envelope, sort).await
    }

    /// Searches across every space the key can read.
    pub async fn search_global(
        &self,
        query: &str,
        types: &[String],
        page: PageRequest,
        sort: SortPreference,
    ) -> AppResult<Paginated<SpaceObject>> {
        let body = search_body(query, types, sort);
        let envelope: ListEnvelope<RawSpaceObject> = self
            .client
            .post(&["search"], &page_query(page), &body)
            .await?;
        self.object_page(envelope, sort).await
    }

    async fn object_page(
        &self,
        envelope: ListEnvelope<RawSpaceObject>,
        sort: SortPreference,
    ) -> AppResult<Paginated<SpaceObject>> {
        debug!(
            count = envelope.data.len(),
            total = envelope.pagination.total,
            "mapping object page"
        );
        Ok(Paginated {
            items: map_objects(&envelope.data, &self.icons, sort).await?,
            pagination: envelope.pagination,
        })
    }

    pub async fn get_object(&self, space_id: &str, object_id: &str) -> AppResult<SpaceObject> {
        let envelope: ObjectEnvelope = self
            .client
            .get(
                &["spaces", space_id, "objects", object_id],
                &[("format", "md".to_string())],
            )
            .await?;
        map_object(&envelope.object, &self.icons).await
    }

    pub async fn create_object(
        &self,
        space_id: &str,
        request: &CreateObjectRequest,
    ) -> AppResult<SpaceObject> {
        let body = ObjectBody {
            name: Some(&request.name),
            type_key: Some(&request.type_key),
            icon: request.icon.as_ref(),
            body: request.body.as_deref(),
            markdown: None,
            template_id: request.template_id.as_deref(),
            properties: Some(request.properties.iter().map(|p| p.to_request()).collect()),
        };
        let envelope: ObjectEnvelope = self
            .client
            .post(&["spaces", space_id, "objects"], &[], &body)
            .await?;
        map_object(&envelope.object, &self.icons).await
    }

    pub async fn update_object(
        &self,
        space_id: &str,
        object_id: &str,
        request: &UpdateObjectRequest,
    ) -> AppResult<SpaceObject> {
        let body = ObjectBody {
            name: request.name.as_deref(),
            type_key: None,
            icon: request.icon.as_ref(),
            body: None,
            markdown: request.markdown.as_deref(),
            template_id: None,
            properties: request
                .properties
                .as_ref()
                .map(|properties| properties.iter().map(|p| p.to_request()).collect()),
        };
        let envelope: ObjectEnvelope = self
            .client
            .patch(&["spaces", space_id, "objects", object_id], &body)
            .await?;
        map_object(&envelope.object, &self.icons).await
    }

    /// Archives the object; the API returns it in its archived state.
    pub async fn delete_object(&self, space_id: &str, object_id: &str) -> AppResult<SpaceObject> {
        let envelope: ObjectEnvelope = self
            .client
            .delete(&["spaces", space_id, "objects", object_id])
            .await?;
        map_object(&envelope.object, &self.icons).await
    }

    // -- members ------------------------------------------------------------

    pub async fn get_members(
        &self,
        space_id: &str,
        page: PageRequest,
    ) -> AppResult<Paginated<Member>> {
        let envelope: ListEnvelope<RawMember> = self
            .client
            .get_page(&["spaces", space_id, "members"], page)
            .await?;
        Ok(Paginated {
            items: map_members(&envelope.data, &self.icons).await?,
            pagination: envelope.pagination,
        })
    }

    pub async fn get_member(&self, space_id: &str, member_id: &str) -> AppResult<Member> {
        let envelope: MemberEnvelope = self
            .client
            .get(&["spaces", space_id, "members", member_id], &[])
            .await?;
        map_member(&envelope.member, &self.icons).await
    }

    pub async fn update_member(
        &self,
        space_id: &str,
        member_id: &str,
        request: &UpdateMemberRequest,
    ) -> AppResult<Member> {
        let envelope: MemberEnvelope = self
            .client
            .patch(&["spaces", space_id, "members", member_id], request)
            .await?;
        map_member(&envelope.member, &self.icons).await
    }

    // -- properties ---------------------------------------------------------

    pub async fn get_properties(
        &self,
        space_id: &str,
        page: PageRequest,
    ) -> AppResult<Paginated<Property>> {
        let envelope: ListEnvelope<RawProperty> = self
            .client
            .get_page(&["spaces", space_id, "properties"], page)
            .await?;
        Ok(Paginated {
            items: map_properties(&envelope.data)?,
            pagination: envelope.pagination,
        })
    }

    pub async fn get_property(&self, space_id: &str, property_id: &str) -> AppResult<Property> {
        let envelope: PropertyEnvelope = self
            .client
            .get(&["spaces", space_id, "properties", property_id], &[])
            .await?;
        map_property(&envelope.property)
    }

    pub async fn create_property(
        &self,
        space_id: &str,
        request: &CreatePropertyRequest,
    ) -> AppResult<Property> {
        let envelope: PropertyEnvelope = self
            .client
            .post(&["spaces", space_id, "properties"], &[], request)
            .await?;
        map_property(&envelope.property)
    }

    pub async fn update_property(
        &self,
        space_id: &str,
        property_id: &str,
        request: &UpdatePropertyRequest,
    ) -> AppResult<Property> {
        let envelope: PropertyEnvelope = self
            .client
            .patch(&["spaces", space_id, "properties", property_id], request)
            .await?;
        map_property(&envelope.property)
    }

    pub async fn delete_property(&self, space_id: &str, property_id: &str) -> AppResult<Property> {
        let envelope: PropertyEnvelope = self
            .client
            .delete(&["spaces", space_id, "properties", property_id])
            .await?;
        map_property(&envelope.property)
    }

    // -- tags ---------------------------------------------------------------

    pub async fn get_tags(
        &self,
        space_id: &str,
        property_id: &str,
        page: PageRequest,
    ) -> AppResult<Paginated<Tag>> {
        let envelope: ListEnvelope<RawTag> = self
            .client
            .get_page(&["spaces", space_id, "properties", property_id, "tags"], page)
            .await?;
        Ok(Paginated {
            items: map_tags(&envelope.data)?,
            pagination: envelope.pagination,
        })
    }

    pub async fn get_tag(&self, space_id: &str, property_id: &str, tag_id: &str) -> AppResult<Tag> {
        let envelope: TagEnvelope = self
            .client
            .get(
                &["spaces", space_id, "properties", property_id, "tags", tag_id],
                &[],
            )
            .await?;
        map_tag(&envelope.tag)
    }

    pub async fn create_tag(
        &self,
        space_id: &str,
        property_id: &str,
        request: &CreateTagRequest,
    ) -> AppResult<Tag> {
        let envelope: TagEnvelope = self
            .client
            .post(
                &["spaces", space_id, "properties", property_id, "tags"],
                &[],
                request,
            )
            .await?;
        map_tag(&envelope.tag)
    }

    pub async fn update_tag(
        &self,
        space_id: &str,
        property_id: &str,
        tag_id: &str,
        request: &UpdateTagRequest,
    ) -> AppResult<Tag> {
        let envelope: TagEnvelope = self
            .client
            .patch(
                &["spaces", space_id, "properties", property_id, "tags", tag_id],
                request,
            )
            .await?;
        map_tag(&envelope.tag)
    }

    pub async fn delete_tag(
        &self,
        space_id: &str,
        property_id: &str,
        tag_id: &str,
    ) -> AppResult<Tag> {
        let envelope: TagEnvelope = self
            .client
            .delete(&["spaces", space_id, "properties", property_id, "tags", tag_id])
            .await?;
        map_tag(&envelope.tag)
    }

    // -- types --------------------------------------------------------------

    pub async fn get_types(&self, space_id: &str, page: PageRequest) -> AppResult<Paginated<Type>> {
        let envelope: ListEnvelope<RawType> = self
            .client
            .get_page(&["spaces", space_id, "types"], page)
            .await?;
        Ok(Paginated {
            items: map_types(&envelope.data, &self.icons).await?,
            pagination: envelope.pagination,
        })
    }

    pub async fn get_type(&self, space_id: &str, type_id: &str) -> AppResult<Type> {
        let envelope: TypeEnvelope = self
            .client
            .get(&["spaces", space_id, "types", type_id], &[])
            .await?;
        map_type(&envelope.object_type, &self.icons).await
    }

    pub async fn create_type(&self, space_id: &str, request: &CreateTypeRequest) -> AppResult<Type> {
        let envelope: TypeEnvelope = self
            .client
            .post(&["spaces", space_id, "types"], &[], request)
            .await?;
        map_type(&envelope.object_type, &self.icons).await
    }

    pub async fn update_type(
        &self,
        space_id: &str,
        type_id: &str,
        request: &UpdateTypeRequest,
    ) -> AppResult<Type> {
        let envelope: TypeEnvelope = self
            .client
            .patch(&["spaces", space_id, "types", type_id], request)
            .await?;
        map_type(&envelope.object_type, &self.icons).await
    }

    pub async fn delete_type(&self, space_id: &str, type_id: &str) -> AppResult<Type> {
        let envelope: TypeEnvelope = self
            .client
            .delete(&["spaces", space_id, "types", type_id])
            .await?;
        map_type(&envelope.object_type, &self.icons).await
    }

    // -- templates ----------------------------------------------------------

    pub async fn get_templates(
        &self,
        space_id: &str,
        type_id: &str,
        page: PageRequest,
    ) -> AppResult<Paginated<Template>> {
        let envelope: ListEnvelope<RawTemplate> = self
            .client
            .get_page(&["spaces", space_id, "types", type_id, "templates"], page)
            .await?;
        let mut items = Vec::with_capacity(envelope.data.len());
        for raw in &envelope.data {
            items.push(map_object(raw, &self.icons).await?);
        }
        Ok(Paginated {
            items,
            pagination: envelope.pagination,
        })
    }

    pub async fn get_template(
        &self,
        space_id: &str,
        type_id: &str,
        template_id: &str,
    ) -> AppResult<Template> {
        let envelope: TemplateEnvelope = self
            .client
            .get(
                &["spaces", space_id, "types", type_id, "templates", template_id],
                &[],
            )
            .await?;
        map_object(&envelope.template, &self.icons).await
    }
}

fn no_types(types: &&[String]) -> bool {
    types.is_empty()
}

fn search_body<'a>(query: &'a str, types: &'a [String], sort: SortPreference) -> SearchRequest<'a> {
    SearchRequest {
        query,
        types,
        sort: SearchSort {
            property_key: sort.key(),
            direction: sort.direction(),
        },
    }
}
