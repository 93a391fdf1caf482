table! {
    documents (id) {
        id -> Uuid,
        owner -> Uuid,
        name -> Text,
        kind -> Text,
        mime -> Nullable<Text>,
        size -> Int8,
        storage_key -> Text,
        created -> Timestamptz,
    }
}

table! {
    dossiers (id) {
        id -> Uuid,
        student_id -> Uuid,
        program -> Text,
        institution -> Nullable<Text>,
        intake -> Nullable<Text>,
        status -> Text,
        staff_note -> Nullable<Text>,
        created -> Timestamptz,
        updated -> Timestamptz,
    }
}

table! {
    messages (id) {
        id -> Uuid,
        student_id -> Uuid,
        sender_id -> Uuid,
        body -> Text,
        created -> Timestamptz,
        read_at -> Nullable<Timestamptz>,
    }
}

table! {
    payments (id) {
        id -> Uuid,
        user_id -> Uuid,
        transaction_id -> Text,
        method -> Text,
        country -> Text,
        amount -> Int8,
        currency -> Text,
        installment -> Int2,
        status -> Text,
        payment_url -> Nullable<Text>,
        created -> Timestamptz,
        updated -> Timestamptz,
    }
}

table! {
    profiles (id) {
        id -> Uuid,
        email -> Varchar,
        password_hash -> Text,
        full_name -> Text,
        phone -> Nullable<Text>,
        country -> Nullable<Text>,
        role -> Text,
        split_payment_allowed -> Bool,
        created -> Timestamptz,
        last_login -> Nullable<Timestamptz>,
    }
}

table! {
    settings (id) {
        id -> Int4,
        price_cents -> Int8,
        split_payment_enabled -> Bool,
        whatsapp_number -> Text,
        updated -> Timestamptz,
    }
}

joinable!(documents -> profiles (owner));
joinable!(dossiers -> profiles (student_id));
joinable!(messages -> profiles (student_id));
joinable!(payments -> profiles (user_id));

allow_tables_to_appear_in_same_query!(
    documents,
    dossiers,
    messages,
    payments,
    profiles,
    settings,
);
