//! Field registry and dispatch.

use crate::context::RequestContext;
use crate::gate::Resolver;
use homegate_protocol::{ApiError, ApiRequest, ApiResponse, ErrorCode, OperationKind};
use std::collections::HashMap;
use tracing::{debug, error};

/// The set of root fields the API serves.
pub struct Schema {
    fields: HashMap<(OperationKind, String), Resolver>,
}

impl Schema {
    /// Starts building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            fields: HashMap::new(),
        }
    }

    /// Returns true if `name` is registered under `kind`.
    pub fn has_field(&self, kind: OperationKind, name: &str) -> bool {
        self.fields.contains_key(&(kind, name.to_string()))
    }

    /// Returns the number of registered fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is registered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolves one request.
    ///
    /// Resolver errors are rendered into the response `errors` array; this
    /// never fails.
    pub fn execute(&self, ctx: &RequestContext, request: &ApiRequest) -> ApiResponse {
        let Some(resolver) = self.fields.get(&(request.operation, request.field.clone())) else {
            debug!(field = %request.field, "unknown field");
            return ApiResponse::error(ApiError::new(
                ErrorCode::BadUserInput,
                format!("unknown {:?} field `{}`", request.operation, request.field),
            ));
        };

        match resolver(ctx, request) {
            Ok(data) => ApiResponse::ok(data),
            Err(err) => {
                if err.is_server_error() {
                    error!(field = %request.field, error = %err, "resolver failed");
                } else {
                    debug!(field = %request.field, error = %err, "request rejected");
                }
                ApiResponse::error(err.to_api_error())
            }
        }
    }
}

/// Builder for `Schema`.
pub struct SchemaBuilder {
    fields: HashMap<(OperationKind, String), Resolver>,
}

impl SchemaBuilder {
    /// Registers a query field.
    pub fn query(self, name: &str, resolver: Resolver) -> Self {
        self.field(OperationKind::Query, name, resolver)
    }

    /// Registers a mutation field.
    pub fn mutation(self, name: &str, resolver: Resolver) -> Self {
        self.field(OperationKind::Mutation, name, resolver)
    }

    /// Registers a field, replacing any previous one with the same name.
    pub fn field(mut self, kind: OperationKind, name: &str, resolver: Resolver) -> Self {
        self.fields.insert((kind, name.to_string()), resolver);
        self
    }

    /// Finishes the schema.
    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
        }
    }
}
