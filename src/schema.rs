// Dealscope schema - pricing settings and deal submissions for Diesel ORM

diesel::table! {
    settings (key) {
        key -> Text,
        value_json -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    deal_submissions (id) {
        id -> Integer,
        deal_id -> Text,
        company -> Nullable<Text>,
        requestor_name -> Text,
        deal_stage -> Nullable<Text>,
        payload_json -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(settings, deal_submissions,);
