// Table definitions for the catalog schema. The generated
// `full_text_index` tsvector column is intentionally absent: diesel never
// writes it, and the full-text queries that read it go through raw SQL.

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::*;

    documents (id) {
        id -> Int4,
        filename -> Varchar,
        blob_key -> Varchar,
        size_bytes -> Nullable<Int8>,
        status -> Varchar,
        progress -> Int4,
        error -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        processed_at -> Nullable<Timestamptz>,
        extracted_text -> Nullable<Text>,
        ai_analysis -> Nullable<Jsonb>,
        keywords -> Nullable<Jsonb>,
        metadata -> Nullable<Jsonb>,
        search_vector -> Nullable<Vector>,
        preview_key -> Nullable<Varchar>,
    }
}

diesel::table! {
    taxonomy_terms (id) {
        id -> Int4,
        term -> Varchar,
        primary_category -> Nullable<Varchar>,
        subcategory -> Nullable<Varchar>,
        description -> Nullable<Text>,
        parent_id -> Nullable<Int4>,
    }
}

diesel::table! {
    taxonomy_synonyms (id) {
        id -> Int4,
        term_id -> Int4,
        synonym -> Varchar,
    }
}

diesel::table! {
    document_taxonomy_map (document_id, term_id) {
        document_id -> Int4,
        term_id -> Int4,
    }
}

diesel::table! {
    search_queries (id) {
        id -> Int4,
        query_text -> Text,
        actor_id -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(taxonomy_synonyms -> taxonomy_terms (term_id));
diesel::joinable!(document_taxonomy_map -> documents (document_id));
diesel::joinable!(document_taxonomy_map -> taxonomy_terms (term_id));

diesel::allow_tables_to_appear_in_same_query!(
    documents,
    taxonomy_terms,
    taxonomy_synonyms,
    document_taxonomy_map,
    search_queries,
);
