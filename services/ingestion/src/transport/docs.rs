use serde_json::{Value, json};

const UPLOAD_DESCRIPTION: &str = "Load records into a table. Records are written in batches \
of at most the configured batch size, with a bounded number of store calls in flight.";

const UPLOAD_OK_DESCRIPTION: &str = "Every batch was dispatched. Store failures, including \
records whose attributes are not typed values, fail only their own batch and do not change \
the status; the body depends on the configured response mode.";

const ATTRIBUTE_DESCRIPTION: &str =
    "Single-key object tagged S, N, B, SS, NS, BS, M, L, NULL or BOOL.";

/// OpenAPI 3.0 description of the upload endpoint, served at `/api-docs`.
pub(super) fn openapi_document() -> Value {
    json!({
        "openapi": "3.0.0",
        "info": {
            "title": "ingestion",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/upload-json": {
                "post": {
                    "description": UPLOAD_DESCRIPTION,
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/UploadRequest" }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": UPLOAD_OK_DESCRIPTION,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "oneOf": [
                                            { "type": "object" },
                                            {
                                                "type": "array",
                                                "items": {
                                                    "$ref": "#/components/schemas/BatchWriteParams"
                                                }
                                            },
                                            { "$ref": "#/components/schemas/IngestReport" }
                                        ]
                                    }
                                }
                            }
                        },
                        "400": error_response(
                            "Missing field, malformed body or wrong content type"
                        ),
                        "413": error_response("Body exceeds the configured limit")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "AttributeValue": {
                    "type": "object",
                    "description": ATTRIBUTE_DESCRIPTION,
                    "minProperties": 1,
                    "maxProperties": 1
                },
                "Item": {
                    "type": "object",
                    "additionalProperties": {
                        "$ref": "#/components/schemas/AttributeValue"
                    }
                },
                "UploadRequest": {
                    "type": "object",
                    "required": ["content", "table_name", "partition_key_name"],
                    "properties": {
                        "content": {
                            "type": "object",
                            "required": ["Items"],
                            "properties": {
                                "Items": {
                                    "type": "array",
                                    "items": { "$ref": "#/components/schemas/Item" }
                                },
                                "Count": { "type": "integer" },
                                "ScannedCount": { "type": "integer" },
                                "ConsumedCapacity": { "type": "object" }
                            }
                        },
                        "table_name": { "type": "string" },
                        "partition_key_name": { "type": "string" }
                    }
                },
                "BatchWriteParams": {
                    "type": "object",
                    "properties": {
                        "RequestItems": {
                            "type": "object",
                            "additionalProperties": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "PutRequest": {
                                            "type": "object",
                                            "properties": {
                                                "Item": { "$ref": "#/components/schemas/Item" }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "IngestReport": {
                    "type": "object",
                    "properties": {
                        "table_name": { "type": "string" },
                        "items_total": { "type": "integer" },
                        "batches_total": { "type": "integer" },
                        "waves_total": { "type": "integer" },
                        "batches_succeeded": { "type": "integer" },
                        "batches_with_unprocessed_items": { "type": "integer" },
                        "batches_failed": { "type": "integer" },
                        "unprocessed_items": { "type": "integer" },
                        "batches": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "batch": { "type": "integer" },
                                    "items": { "type": "integer" },
                                    "status": {
                                        "type": "string",
                                        "enum": ["succeeded", "unprocessed_items", "failed"]
                                    },
                                    "unprocessed_items": { "type": "integer" },
                                    "error": { "type": "string" }
                                }
                            }
                        }
                    }
                },
                "ErrorBody": {
                    "type": "object",
                    "required": ["message"],
                    "properties": { "message": { "type": "string" } }
                }
            }
        }
    })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorBody" }
            }
        }
    })
}
