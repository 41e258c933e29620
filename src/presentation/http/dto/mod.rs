pub mod document_dto;
pub mod response_dto;
pub mod search_dto;

pub use document_dto::{
    DocumentDetailDto, DocumentStatusDto, ReprocessResponseDto, UploadResponseDto,
    UploadedDocumentDto,
};
pub use response_dto::{
    error_response, error_response_with_details, internal_error_response, ApiErrorBody,
    ApiErrorDetail,
};
pub use search_dto::{SearchParamsDto, SuggestionParamsDto};
